//! Output tables
//!
//! Every artifact is a flat CSV file in the output folder, except the
//! address clusters which are a JSON object keyed by cluster fingerprint.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cluster::{ClusterCatalog, ClusterId};
use crate::error::{Error, Result};
use crate::labeling::WashSummaryRow;
use crate::ledger::{SelfTradeSummaryRow, Trade, TradeRecord, TraderDirectory};

pub const CLUSTERS_FILE: &str = "scc.csv";
pub const CLUSTER_MAPPING_FILE: &str = "scc-mapping.csv";
pub const TRADER_IDS_FILE: &str = "trader_ids.csv";
pub const SELF_TRADES_FILE: &str = "self_trades.csv";
pub const SELF_TRADES_SUMMARY_FILE: &str = "self_trades_summary.csv";
pub const LABELED_TRADES_FILE: &str = "trades_labeled.csv";
pub const WASH_SUMMARY_FILE: &str = "wash_trades_summary.csv";
pub const ADDRESS_CLUSTERS_FILE: &str = "address_clusters.json";

/// Writes pipeline artifacts into one folder
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Create the output folder if needed
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Io(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn write_rows<T, I>(&self, file: &str, rows: I) -> Result<usize>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let path = self.path(file);
        let mut writer = csv::Writer::from_path(&path)?;
        let mut count = 0;
        for row in rows {
            writer.serialize(row)?;
            count += 1;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", count, path.display());
        Ok(count)
    }

    /// Header plus raw field rows, for tables that mirror the input columns
    fn write_table<I>(&self, file: &str, header: &[String], rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let path = self.path(file);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(header)?;
        let mut count = 0;
        for row in rows {
            writer.write_record(&row)?;
            count += 1;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", count, path.display());
        Ok(count)
    }

    /// Self trades with every input column
    pub fn write_self_trades(&self, columns: &[String], self_trades: &[TradeRecord]) -> Result<usize> {
        self.write_table(
            SELF_TRADES_FILE,
            columns,
            self_trades.iter().map(|record| record.input_fields(columns)),
        )
    }

    pub fn write_self_trade_summary(&self, rows: &[SelfTradeSummaryRow]) -> Result<usize> {
        self.write_rows(SELF_TRADES_SUMMARY_FILE, rows)
    }

    pub fn write_trader_ids(&self, directory: &TraderDirectory) -> Result<usize> {
        self.write_rows(TRADER_IDS_FILE, directory.rows())
    }

    /// Cluster table and membership table
    pub fn write_clusters(&self, catalog: &ClusterCatalog) -> Result<()> {
        let clusters = self.write_rows(CLUSTERS_FILE, catalog.summaries())?;
        let memberships = self.write_rows(CLUSTER_MAPPING_FILE, catalog.memberships())?;
        info!(
            "Saved {} clusters ({} memberships) to {}",
            clusters,
            memberships,
            self.dir.display()
        );
        Ok(())
    }

    /// Input columns plus trader ids and the wash label
    pub fn write_labeled_trades(&self, columns: &[String], trades: &[Trade]) -> Result<usize> {
        let header: Vec<String> = columns
            .iter()
            .cloned()
            .chain(Trade::LABEL_COLUMNS.iter().map(|c| c.to_string()))
            .collect();
        let count = self.write_table(
            LABELED_TRADES_FILE,
            &header,
            trades.iter().map(|trade| trade.labeled_fields(columns)),
        )?;
        info!("Saved {} labeled trades", count);
        Ok(count)
    }

    pub fn write_summary(&self, rows: &[WashSummaryRow]) -> Result<usize> {
        self.write_rows(WASH_SUMMARY_FILE, rows)
    }

    /// Member addresses of every relevant cluster
    pub fn write_address_clusters(
        &self,
        catalog: &ClusterCatalog,
        directory: &TraderDirectory,
        relevant: &[ClusterId],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let clusters = address_clusters(catalog, directory, relevant)?;

        let path = self.path(ADDRESS_CLUSTERS_FILE);
        let data = serde_json::to_string(&clusters)?;
        std::fs::write(&path, data)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;

        info!("Saved {} address clusters to {}", clusters.len(), path.display());
        Ok(clusters)
    }
}

/// Resolve relevant clusters to member addresses
pub fn address_clusters(
    catalog: &ClusterCatalog,
    directory: &TraderDirectory,
    relevant: &[ClusterId],
) -> Result<BTreeMap<String, Vec<String>>> {
    relevant
        .iter()
        .map(|id| {
            let addresses = catalog
                .members(id)?
                .iter()
                .filter_map(|&trader| directory.address_of(trader))
                .map(str::to_string)
                .collect();
            Ok((id.to_string(), addresses))
        })
        .collect()
}
