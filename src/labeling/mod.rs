//! Wash trade labeling
//!
//! - Balance-settlement labeler for a single DetailGroup
//! - Fixed-width time buckets per window size
//! - Multi-pass orchestration with a single tri-state label per trade
//! - Per-group summary statistics

pub mod orchestrator;
pub mod settlement;
pub mod summary;
pub mod window;

pub use orchestrator::{DetailGroup, DetailGroupKey, LabelingOutcome, MultiPassOrchestrator, PassStats};
pub use settlement::{GroupTrade, WashTradeLabeler};
pub use summary::{summarize, totals, SummaryTotals, WashSummaryRow};
pub use window::{BucketGrid, TimeBucket};
