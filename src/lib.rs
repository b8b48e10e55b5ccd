//! DEX Wash Trade Detector Library
//!
//! Finds recurring cyclic-trading clusters per token in a decentralized
//! exchange trade ledger and labels the trades among them that settle back
//! to zero as wash trades.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod labeling;
pub mod ledger;
pub mod output;
pub mod pipeline;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineReport};
