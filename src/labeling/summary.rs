//! Per-DetailGroup wash trading summary

use serde::Serialize;
use tracing::info;

use super::orchestrator::DetailGroup;
use crate::cluster::ClusterId;

/// One summary row per (cluster, window size, token, time bucket)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WashSummaryRow {
    pub scc_hash: ClusterId,
    pub token: String,
    pub window_size: u64,
    pub time: String,
    pub num_wash_trades: usize,
    pub num_trades: usize,
    pub total_amount_wash: f64,
    pub total_amount: f64,
    pub total_amount_dollar_wash: f64,
    pub total_amount_dollar: f64,
}

impl WashSummaryRow {
    pub fn num_not_wash_trades(&self) -> usize {
        self.num_trades - self.num_wash_trades
    }
}

/// Totals over every group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTotals {
    pub groups: usize,
    pub settled_groups: usize,
    pub wash_trades: usize,
    pub wash_amount_dollar: f64,
}

/// Roll up every DetailGroup into one row
pub fn summarize(groups: &[DetailGroup]) -> Vec<WashSummaryRow> {
    info!("Producing wash trading summary for {} groups", groups.len());

    groups.iter().map(summarize_group).collect()
}

fn summarize_group(group: &DetailGroup) -> WashSummaryRow {
    let mut row = WashSummaryRow {
        scc_hash: group.key.cluster.clone(),
        token: group.key.token.clone(),
        window_size: group.key.window_secs,
        time: group.key.bucket.to_string(),
        num_wash_trades: 0,
        num_trades: group.trades.len(),
        total_amount_wash: 0.0,
        total_amount: 0.0,
        total_amount_dollar_wash: 0.0,
        total_amount_dollar: 0.0,
    };

    for trade in &group.trades {
        row.total_amount += trade.amount;
        row.total_amount_dollar += trade.amount_dollar;
        if trade.label.is_wash() {
            row.num_wash_trades += 1;
            row.total_amount_wash += trade.amount;
            row.total_amount_dollar_wash += trade.amount_dollar;
        }
    }

    row
}

/// Aggregate the summary rows for the run report
pub fn totals(rows: &[WashSummaryRow]) -> SummaryTotals {
    rows.iter().fold(SummaryTotals::default(), |mut acc, row| {
        acc.groups += 1;
        if row.num_wash_trades > 0 {
            acc.settled_groups += 1;
        }
        acc.wash_trades += row.num_wash_trades;
        acc.wash_amount_dollar += row.total_amount_dollar_wash;
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::orchestrator::DetailGroupKey;
    use crate::labeling::settlement::GroupTrade;
    use crate::labeling::window::TimeBucket;
    use crate::ledger::WashLabel;

    fn group(labels: &[WashLabel], amounts: &[f64]) -> DetailGroup {
        let trades = labels
            .iter()
            .zip(amounts)
            .enumerate()
            .map(|(i, (&label, &amount))| GroupTrade {
                row: i,
                tx_hash: format!("t{}", i),
                token: "0xtok".to_string(),
                timestamp: i as i64,
                buyer: 1,
                seller: 2,
                amount,
                amount_dollar: amount * 2.0,
                label,
            })
            .collect();

        DetailGroup {
            key: DetailGroupKey {
                cluster: ClusterId::from_members(&[1, 2]),
                window_secs: 3600,
                token: "0xtok".to_string(),
                bucket: TimeBucket {
                    lower: Some(0),
                    upper: Some(3600),
                },
            },
            trades,
            settled: None,
        }
    }

    #[test]
    fn test_partial_group_counts() {
        let rows = summarize(&[group(
            &[WashLabel::Wash, WashLabel::Wash, WashLabel::Unknown],
            &[1.0, 1.0, 5.0],
        )]);
        let row = &rows[0];

        assert_eq!(row.num_trades, 3);
        assert_eq!(row.num_wash_trades, 2);
        assert_eq!(row.num_wash_trades + row.num_not_wash_trades(), row.num_trades);
        assert_eq!(row.total_amount_wash, 2.0);
        assert_eq!(row.total_amount, 7.0);
        assert!(row.total_amount_wash < row.total_amount);
        assert_eq!(row.total_amount_dollar_wash, 4.0);
        assert_eq!(row.total_amount_dollar, 14.0);
        assert_eq!(row.time, "[0, 3600)");
        assert_eq!(row.window_size, 3600);
    }

    #[test]
    fn test_fully_settled_group_amounts_match() {
        let rows = summarize(&[group(&[WashLabel::Wash; 2], &[3.0, 3.0])]);
        assert_eq!(rows[0].total_amount_wash, rows[0].total_amount);
        assert_eq!(rows[0].num_not_wash_trades(), 0);
    }

    #[test]
    fn test_totals() {
        let rows = summarize(&[
            group(&[WashLabel::Wash; 2], &[3.0, 3.0]),
            group(&[WashLabel::NotWash; 2], &[1.0, 1.0]),
        ]);
        let totals = totals(&rows);

        assert_eq!(totals.groups, 2);
        assert_eq!(totals.settled_groups, 1);
        assert_eq!(totals.wash_trades, 2);
        assert_eq!(totals.wash_amount_dollar, 12.0);
    }
}
