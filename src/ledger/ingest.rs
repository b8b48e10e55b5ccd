//! Canonical trade table loading
//!
//! The input is the preprocessed ledger: one row per ether/token trade with
//! dollar amounts already merged in. Every required column is checked before
//! the first row is parsed so a bad file fails before any detection work.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::trade::TradeRecord;
use crate::error::{Error, Result};

/// Parsed ledger: input column names plus one record per row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeTable {
    /// Header of the input file, canonical and extra columns alike
    pub columns: Vec<String>,
    pub records: Vec<TradeRecord>,
}

/// Load the trade table from a CSV file
pub fn load_trades<P: AsRef<Path>>(path: P) -> Result<TradeTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;

    let table = read_trades(file)?;
    info!(
        "Read {} as trade table with {} rows and {} columns",
        path.display(),
        table.records.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Parse a trade table from any CSV source
pub fn read_trades<R: Read>(source: R) -> Result<TradeTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    debug!("Columns are: {}", headers.iter().collect::<Vec<_>>().join(", "));

    let missing: Vec<String> = TradeRecord::REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        // Header is line 1
        let fallback_line = index as u64 + 2;
        let row = row.map_err(|e| Error::MalformedRow {
            line: e.position().map(|p| p.line()).unwrap_or(fallback_line),
            reason: e.to_string(),
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(fallback_line);

        let mut record: TradeRecord = row
            .deserialize(Some(&headers))
            .map_err(|e| Error::MalformedRow {
                line,
                reason: e.to_string(),
            })?;

        validate_record(&record).map_err(|reason| Error::MalformedRow { line, reason })?;

        if !seen.insert(record.tx_hash.clone()) {
            return Err(Error::MalformedRow {
                line,
                reason: format!("duplicate transaction id {}", record.tx_hash),
            });
        }

        record.raw = row.iter().map(str::to_string).collect();
        records.push(record);
    }

    Ok(TradeTable {
        columns: headers.iter().map(str::to_string).collect(),
        records,
    })
}

fn validate_record(record: &TradeRecord) -> std::result::Result<(), String> {
    if record.tx_hash.is_empty() {
        return Err("empty transaction id".to_string());
    }
    if record.token.is_empty() {
        return Err("empty token".to_string());
    }
    if record.eth_buyer.is_empty() || record.eth_seller.is_empty() {
        return Err("empty trader address".to_string());
    }

    for (name, value) in [
        ("trade_amount_eth", record.amount_eth),
        ("trade_amount_token", record.amount_token),
        ("trade_amount_dollar", record.amount_dollar),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{} must be a finite non-negative number, got {}", name, value));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "date,cut,blockNumber,timestamp,transactionHash,eth_buyer,eth_seller,ether,token,trade_amount_eth,trade_amount_dollar,trade_amount_token,token_price_in_eth";

    #[test]
    fn test_reads_canonical_rows_and_keeps_extra_columns() {
        let csv = format!(
            "{}\n2018-01-01,1514764800,100,1514764900,0xt1,0xa,0xb,0x0,0xtok,1.5,1200.0,300.0,0.005\n",
            HEADER
        );
        let table = read_trades(csv.as_bytes()).unwrap();

        assert_eq!(table.columns.len(), 13);
        assert_eq!(table.columns[2], "blockNumber");
        assert_eq!(table.records.len(), 1);
        let r = &table.records[0];
        assert_eq!(r.tx_hash, "0xt1");
        assert_eq!(r.day_start, 1_514_764_800);
        assert_eq!(r.timestamp, 1_514_764_900);
        assert_eq!(r.amount_token, 300.0);
        assert_eq!(r.amount_dollar, 1200.0);
        assert_eq!(r.raw[0], "2018-01-01");
        assert_eq!(r.raw[2], "100");
        assert_eq!(r.input_fields(&table.columns), r.raw);
    }

    #[test]
    fn test_missing_columns_fail_before_rows() {
        let csv = "transactionHash,token,timestamp\n0xt1,0xtok,1\n";
        let err = read_trades(csv.as_bytes()).unwrap_err();

        match err {
            Error::MissingColumns(columns) => {
                assert!(columns.contains(&"cut".to_string()));
                assert!(columns.contains(&"eth_buyer".to_string()));
                assert!(!columns.contains(&"token".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_amount_is_rejected() {
        let csv = format!(
            "{}\n2018-01-01,1514764800,100,1514764900,0xt1,0xa,0xb,0x0,0xtok,abc,1200.0,300.0,0.005\n",
            HEADER
        );
        let err = read_trades(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_transaction_is_rejected() {
        let row = "2018-01-01,1514764800,100,1514764900,0xt1,0xa,0xb,0x0,0xtok,1.0,1.0,1.0,1.0";
        let csv = format!("{}\n{}\n{}\n", HEADER, row, row);
        let err = read_trades(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_trades("/nonexistent/trades.csv").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
