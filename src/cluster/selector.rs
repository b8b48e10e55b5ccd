//! Relevant cluster selection by minimum recurrence

use tracing::info;

use super::registry::{ClusterCatalog, ClusterId};

/// Clusters kept for labeling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSelection {
    /// Kept cluster ids in fingerprint order
    pub relevant: Vec<ClusterId>,
    /// Smallest recurrence count among kept clusters
    pub min_occurrence: Option<u64>,
}

impl ClusterSelection {
    pub fn len(&self) -> usize {
        self.relevant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relevant.is_empty()
    }
}

/// Keep every cluster observed at least `threshold` times.
///
/// This is a raw count comparison; the threshold is not a rank or percentile.
pub fn select_relevant(catalog: &ClusterCatalog, threshold: u64) -> ClusterSelection {
    let relevant: Vec<ClusterId> = catalog
        .ids()
        .filter(|id| catalog.recurrence(id) >= threshold)
        .cloned()
        .collect();

    let min_occurrence = relevant.iter().map(|id| catalog.recurrence(id)).min();

    info!(
        "Determined {} unique clusters to be relevant at threshold {}",
        relevant.len(),
        threshold
    );
    match min_occurrence {
        Some(min) => info!("Minimum occurrence is {}", min),
        None => info!("No cluster reached the occurrence threshold"),
    }

    ClusterSelection {
        relevant,
        min_occurrence,
    }
}
