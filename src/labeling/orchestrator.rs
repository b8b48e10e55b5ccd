//! Multi-pass wash trade labeling
//!
//! Each window size is one pass. Within a pass every relevant cluster selects
//! its open trades (both parties in the cluster, not yet confirmed wash),
//! marks them checked, splits them into (token, time bucket) DetailGroups and
//! settles each group. Passes and clusters run strictly in the given order
//! because later selections depend on labels written by earlier ones.

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use super::settlement::{GroupTrade, WashTradeLabeler};
use super::window::{BucketGrid, TimeBucket};
use crate::cluster::{ClusterCatalog, ClusterId};
use crate::error::Result;
use crate::ledger::{AmountSide, Trade, TraderId, WashLabel};

/// Identity of one DetailGroup
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DetailGroupKey {
    pub cluster: ClusterId,
    pub window_secs: u64,
    pub token: String,
    pub bucket: TimeBucket,
}

/// One labeled partition, as the labeler left it
#[derive(Debug, Clone)]
pub struct DetailGroup {
    pub key: DetailGroupKey,
    pub trades: Vec<GroupTrade>,
    /// Length of the settled prefix, if the group settled
    pub settled: Option<usize>,
}

/// Per-pass counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub window_secs: u64,
    pub clusters_with_trades: usize,
    pub trades_checked: usize,
    pub groups: usize,
    pub wash_trades: usize,
}

/// Everything produced by the labeling passes
#[derive(Debug, Clone, Default)]
pub struct LabelingOutcome {
    pub groups: Vec<DetailGroup>,
    pub passes: Vec<PassStats>,
}

impl LabelingOutcome {
    pub fn wash_trades(&self) -> usize {
        self.passes.iter().map(|p| p.wash_trades).sum()
    }
}

/// Drives the labeler across window sizes and relevant clusters
pub struct MultiPassOrchestrator<'a> {
    catalog: &'a ClusterCatalog,
    labeler: WashTradeLabeler,
    side: AmountSide,
    window_start: Option<i64>,
}

impl<'a> MultiPassOrchestrator<'a> {
    pub fn new(catalog: &'a ClusterCatalog, labeler: WashTradeLabeler, side: AmountSide) -> Self {
        Self {
            catalog,
            labeler,
            side,
            window_start: None,
        }
    }

    /// Anchor buckets at `start` instead of the earliest day start in the data
    pub fn with_window_start(mut self, start: Option<i64>) -> Self {
        self.window_start = start;
        self
    }

    /// Run every pass over the trade table, updating labels in place
    pub fn run(
        &self,
        trades: &mut [Trade],
        relevant: &[ClusterId],
        window_sizes: &[u64],
    ) -> Result<LabelingOutcome> {
        info!("Starting wash trade labeling with {} passes", window_sizes.len());

        let mut outcome = LabelingOutcome::default();
        let (Some(first_day), Some(last_ts)) = (
            trades.iter().map(|t| t.record.day_start).min(),
            trades.iter().map(|t| t.timestamp()).max(),
        ) else {
            return Ok(outcome);
        };
        let start = self.window_start.unwrap_or(first_day);

        for &window_secs in window_sizes {
            let grid = BucketGrid::new(start, last_ts, window_secs);
            info!(
                "Processing {} clusters for window size {} ({} buckets)",
                relevant.len(),
                window_secs,
                grid.breaks() + 1
            );

            let mut stats = PassStats {
                window_secs,
                ..Default::default()
            };

            for cluster in relevant {
                let groups = self.label_cluster(trades, cluster, window_secs, &grid)?;
                if groups.is_empty() {
                    continue;
                }

                stats.clusters_with_trades += 1;
                stats.groups += groups.len();
                for group in &groups {
                    stats.trades_checked += group.trades.len();
                    stats.wash_trades += group.settled.unwrap_or(0);
                }
                outcome.groups.extend(groups);
            }

            info!(
                window_secs,
                trades_checked = stats.trades_checked,
                groups = stats.groups,
                wash_trades = stats.wash_trades,
                "Pass complete"
            );
            outcome.passes.push(stats);
        }

        Ok(outcome)
    }

    /// Select, mark, partition and settle one cluster's trades for one pass
    fn label_cluster(
        &self,
        trades: &mut [Trade],
        cluster: &ClusterId,
        window_secs: u64,
        grid: &BucketGrid,
    ) -> Result<Vec<DetailGroup>> {
        let members: HashSet<TraderId> = self.catalog.members(cluster)?.iter().copied().collect();

        let mut selected: Vec<GroupTrade> = trades
            .iter()
            .enumerate()
            .filter(|(_, trade)| trade.label.is_open() && trade.within(&members))
            .map(|(row, trade)| self.group_trade(row, trade))
            .collect();
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        // Checked in this pass, whatever the labeler decides
        for trade in &selected {
            trades[trade.row].label.mark_checked();
        }

        selected.sort_by_key(|t| t.timestamp);

        let mut partitions: BTreeMap<(String, TimeBucket), Vec<GroupTrade>> = BTreeMap::new();
        for trade in selected {
            partitions
                .entry((trade.token.clone(), grid.bucket_of(trade.timestamp)))
                .or_default()
                .push(trade);
        }

        let mut groups = Vec::with_capacity(partitions.len());
        let mut wash_rows = Vec::new();
        for ((token, bucket), mut group_trades) in partitions {
            let settled = self.labeler.label(&mut group_trades);
            wash_rows.extend(
                group_trades
                    .iter()
                    .filter(|t| t.label.is_wash())
                    .map(|t| t.row),
            );

            groups.push(DetailGroup {
                key: DetailGroupKey {
                    cluster: cluster.clone(),
                    window_secs,
                    token,
                    bucket,
                },
                trades: group_trades,
                settled,
            });
        }

        // Confirmed wash overrides the checked mark
        for &row in &wash_rows {
            trades[row].label = WashLabel::Wash;
        }

        debug!(
            cluster = %cluster.short(),
            window_secs,
            groups = groups.len(),
            wash_trades = wash_rows.len(),
            "Cluster labeled"
        );

        Ok(groups)
    }

    fn group_trade(&self, row: usize, trade: &Trade) -> GroupTrade {
        let (buyer, seller, amount) = trade.leg(self.side);
        GroupTrade {
            row,
            tx_hash: trade.tx_hash().to_string(),
            token: trade.token().to_string(),
            timestamp: trade.timestamp(),
            buyer,
            seller,
            amount,
            amount_dollar: trade.amount_dollar(),
            label: trade.label,
        }
    }
}
