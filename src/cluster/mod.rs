//! Wash trading cluster discovery
//!
//! This module finds groups of traders that repeatedly trade in circles:
//! - Per-token trade-count graphs peeled layer by layer
//! - Content-addressed cluster registry with recurrence counts
//! - Relevance selection by minimum recurrence

pub mod detector;
pub mod graph;
pub mod registry;
pub mod selector;

pub use detector::{token_graphs, DetectionReport, GraphClusterDetector, PeelLimits, TokenDetection};
pub use graph::TradeGraph;
pub use registry::{ClusterCatalog, ClusterId, ClusterMembershipRow, ClusterRegistry, ClusterSummaryRow};
pub use selector::{select_relevant, ClusterSelection};
