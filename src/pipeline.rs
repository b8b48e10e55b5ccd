//! End-to-end wash trade detection run
//!
//! ingest -> self-trade filter -> trader ids -> cluster detection ->
//! relevance selection -> multi-pass labeling -> summary -> address clusters

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cluster::{select_relevant, ClusterCatalog, ClusterRegistry, ClusterSelection, GraphClusterDetector, PeelLimits};
use crate::config::Config;
use crate::error::Result;
use crate::labeling::{summarize, totals, MultiPassOrchestrator, WashTradeLabeler};
use crate::ledger::{filter_self_trades, load_trades, summarize_self_trades, Trade, TraderDirectory};
use crate::output::OutputWriter;

/// Headline numbers of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub trades: usize,
    pub self_trades: usize,
    pub traders: usize,
    pub clusters: usize,
    pub relevant_clusters: usize,
    pub detail_groups: usize,
    pub wash_trades: usize,
    pub wash_volume_dollar: f64,
    pub truncated_tokens: Vec<String>,
}

/// Trades with ids plus everything cluster detection produced
pub struct DetectedLedger {
    /// Input column names, replayed in the labeled table
    pub columns: Vec<String>,
    pub trades: Vec<Trade>,
    pub directory: TraderDirectory,
    pub catalog: ClusterCatalog,
    pub self_trades: usize,
    pub truncated_tokens: Vec<String>,
}

/// Pipeline bound to one configuration and output folder
pub struct Pipeline {
    config: Config,
    writer: OutputWriter,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        let writer = OutputWriter::create(&config.output.dir)?;
        Ok(Self {
            config,
            writer,
            cancel,
        })
    }

    pub fn writer(&self) -> &OutputWriter {
        &self.writer
    }

    /// Ingest the ledger and discover clusters, writing the cluster tables
    pub async fn detect(&self) -> Result<DetectedLedger> {
        // Fails fast on missing columns before any detection work
        let table = load_trades(&self.config.input.trades_path)?;
        let columns = table.columns;

        let split = filter_self_trades(table.records);
        self.writer.write_self_trades(&columns, &split.self_trades)?;
        self.writer
            .write_self_trade_summary(&summarize_self_trades(&split.self_trades))?;

        let mut directory = TraderDirectory::new();
        let trades = directory.assign(split.non_self_trades)?;
        self.writer.write_trader_ids(&directory)?;

        let registry = Arc::new(ClusterRegistry::new());
        let detector = GraphClusterDetector::new(
            registry.clone(),
            PeelLimits {
                max_iterations: self.config.detection.max_peel_iterations,
                cancel: self.cancel.clone(),
            },
        );
        let report = detector
            .detect_all(&trades, self.config.detection.parallelism)
            .await?;

        let catalog = registry.catalog();
        self.writer.write_clusters(&catalog)?;

        Ok(DetectedLedger {
            columns,
            trades,
            directory,
            catalog,
            self_trades: split.self_trades.len(),
            truncated_tokens: report.truncated_tokens,
        })
    }

    /// Full run: detection, selection, labeling and summaries
    pub async fn run(&self) -> Result<PipelineReport> {
        let DetectedLedger {
            columns,
            mut trades,
            directory,
            catalog,
            self_trades,
            truncated_tokens,
        } = self.detect().await?;

        let ClusterSelection { relevant, .. } =
            select_relevant(&catalog, self.config.detection.min_occurrence);

        let labeling = &self.config.labeling;
        let orchestrator = MultiPassOrchestrator::new(
            &catalog,
            WashTradeLabeler::new(labeling.margin),
            labeling.amount_side,
        )
        .with_window_start(labeling.window_start);
        let outcome = orchestrator.run(&mut trades, &relevant, &labeling.window_sizes_secs)?;
        self.writer.write_labeled_trades(&columns, &trades)?;

        let rows = summarize(&outcome.groups);
        self.writer.write_summary(&rows)?;
        let totals = totals(&rows);

        self.writer
            .write_address_clusters(&catalog, &directory, &relevant)?;

        let report = PipelineReport {
            trades: trades.len(),
            self_trades,
            traders: directory.len(),
            clusters: catalog.len(),
            relevant_clusters: relevant.len(),
            detail_groups: totals.groups,
            wash_trades: trades.iter().filter(|t| t.label.is_wash()).count(),
            wash_volume_dollar: trades
                .iter()
                .filter(|t| t.label.is_wash())
                .map(Trade::amount_dollar)
                .sum(),
            truncated_tokens,
        };

        info!(
            trades = report.trades,
            relevant_clusters = report.relevant_clusters,
            wash_trades = report.wash_trades,
            wash_volume_dollar = report.wash_volume_dollar,
            "Wash trade detection complete"
        );

        Ok(report)
    }
}
