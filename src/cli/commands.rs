//! CLI command implementations

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cluster::select_relevant;
use crate::config::Config;
use crate::pipeline::Pipeline;

/// Run the full detection and labeling pipeline
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<()> {
    info!("Starting wash trade detection...");
    info!(
        "Margin: {}, window sizes: {:?}s, amount side: {}",
        config.labeling.margin, config.labeling.window_sizes_secs, config.labeling.amount_side
    );

    let pipeline = Pipeline::new(config.clone(), cancel)
        .with_context(|| format!("Cannot prepare output folder {}", config.output.dir.display()))?;
    let report = pipeline.run().await.context("Pipeline failed")?;

    for token in &report.truncated_tokens {
        warn!("Cluster detection for token {} hit the iteration cap", token);
    }

    println!("\n=== WASH TRADE DETECTION ===\n");
    println!("Trades analysed:   {}", report.trades);
    println!("Self trades:       {}", report.self_trades);
    println!("Traders:           {}", report.traders);
    println!("Clusters found:    {}", report.clusters);
    println!(
        "Relevant clusters: {} (min occurrence {})",
        report.relevant_clusters, config.detection.min_occurrence
    );
    println!("Detail groups:     {}", report.detail_groups);
    println!("Wash trades:       {}", report.wash_trades);
    println!("Wash volume:       ${:.2}", report.wash_volume_dollar);
    println!("\nOutput written to {}", pipeline.writer().dir().display());

    Ok(())
}

/// Ingest and detect clusters only
pub async fn clusters(config: &Config, cancel: CancellationToken) -> Result<()> {
    info!("Detecting trading clusters...");

    let pipeline = Pipeline::new(config.clone(), cancel)
        .with_context(|| format!("Cannot prepare output folder {}", config.output.dir.display()))?;
    let detected = pipeline.detect().await.context("Cluster detection failed")?;
    let selection = select_relevant(&detected.catalog, config.detection.min_occurrence);

    println!("\n=== TRADING CLUSTERS ===\n");
    println!("Trades analysed:   {}", detected.trades.len());
    println!("Clusters found:    {}", detected.catalog.len());
    println!(
        "Relevant clusters: {} (min occurrence {})",
        selection.len(),
        config.detection.min_occurrence
    );
    if let Some(min) = selection.min_occurrence {
        println!("Lowest kept occurrence: {}", min);
    }

    let mut top = detected.catalog.summaries();
    top.sort_by(|a, b| b.occurrence.cmp(&a.occurrence).then_with(|| a.scc_hash.cmp(&b.scc_hash)));
    if !top.is_empty() {
        println!("\n=== MOST RECURRENT ===\n");
        for row in top.iter().take(10) {
            println!(
                "{}  occurrence={}  traders={}",
                row.scc_hash.short(),
                row.occurrence,
                row.num_traders
            );
        }
    }

    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display());
    Ok(())
}
