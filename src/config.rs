//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ledger::AmountSide;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub labeling: LabelingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Preprocessed trade table (CSV)
    #[serde(default = "default_trades_path")]
    pub trades_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Folder receiving every output table
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Minimum recurrence count for a cluster to be labeled.
    /// Compared as a raw count, not a rank.
    #[serde(default = "default_min_occurrence", alias = "scc_threshold_rank")]
    pub min_occurrence: u64,
    /// Cap on peeling layers per token (unbounded when unset)
    #[serde(default)]
    pub max_peel_iterations: Option<usize>,
    /// Tokens decomposed concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelingConfig {
    /// Maximum normalized net balance for a settled group
    #[serde(default = "default_margin")]
    pub margin: f64,
    /// Window sizes in seconds, one labeling pass each, in order
    #[serde(default = "default_window_sizes")]
    pub window_sizes_secs: Vec<u64>,
    /// Trade leg feeding the balance heuristic
    #[serde(default)]
    pub amount_side: AmountSide,
    /// Bucket anchor override (unix seconds)
    #[serde(default)]
    pub window_start: Option<i64>,
}

fn default_trades_path() -> PathBuf {
    PathBuf::from("data/IDEXTrades-preprocessed.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output_IDEX")
}

fn default_min_occurrence() -> u64 {
    100
}

fn default_parallelism() -> usize {
    4
}

fn default_margin() -> f64 {
    0.1
}

fn default_window_sizes() -> Vec<u64> {
    vec![60 * 60 * 24 * 7]
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            trades_path: default_trades_path(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_occurrence: default_min_occurrence(),
            max_peel_iterations: None,
            parallelism: default_parallelism(),
        }
    }
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            window_sizes_secs: default_window_sizes(),
            amount_side: AmountSide::default(),
            window_start: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            detection: DetectionConfig::default(),
            labeling: LabelingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path.as_ref(), None)
    }

    /// Load with an explicit environment instead of the process one
    fn load_with_env(path: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (WASH_LABELING__MARGIN)
            .add_source(
                config::Environment::with_prefix("WASH")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("labeling.window_sizes_secs")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.labeling.margin.is_finite() || self.labeling.margin < 0.0 {
            anyhow::bail!(
                "margin must be a finite non-negative number, got {}",
                self.labeling.margin
            );
        }

        if self.labeling.window_sizes_secs.is_empty() {
            anyhow::bail!("at least one window size is required");
        }

        if let Some(zero) = self.labeling.window_sizes_secs.iter().position(|&w| w == 0) {
            anyhow::bail!("window size #{} must be positive", zero + 1);
        }

        if self.detection.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }

        if self.detection.max_peel_iterations == Some(0) {
            anyhow::bail!("max_peel_iterations must be at least 1 when set");
        }

        if self.detection.min_occurrence == 0 {
            tracing::warn!("min_occurrence is 0 - every detected cluster will be labeled");
        }

        Ok(())
    }

    /// Configuration rendered for display
    pub fn display(&self) -> String {
        format!(
            r#"Configuration:
  Input:
    trades: {}
  Output:
    dir: {}
  Detection:
    min_occurrence: {}
    max_peel_iterations: {}
    parallelism: {}
  Labeling:
    margin: {}
    window_sizes: {:?} s
    amount_side: {}
    window_start: {}
"#,
            self.input.trades_path.display(),
            self.output.dir.display(),
            self.detection.min_occurrence,
            self.detection
                .max_peel_iterations
                .map(|n| n.to_string())
                .unwrap_or_else(|| "(unbounded)".to_string()),
            self.detection.parallelism,
            self.labeling.margin,
            self.labeling.window_sizes_secs,
            self.labeling.amount_side,
            self.labeling
                .window_start
                .map(|s| s.to_string())
                .unwrap_or_else(|| "(earliest day in data)".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.detection.min_occurrence, 100);
        assert_eq!(config.labeling.margin, 0.1);
        assert_eq!(config.labeling.window_sizes_secs, vec![604_800]);
        assert_eq!(config.labeling.amount_side, AmountSide::Token);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("washscan.toml");
        std::fs::write(
            &path,
            r#"
[detection]
scc_threshold_rank = 7

[labeling]
margin = 0.25
window_sizes_secs = [3600, 86400]
amount_side = "ether"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.detection.min_occurrence, 7);
        assert_eq!(config.labeling.margin, 0.25);
        assert_eq!(config.labeling.window_sizes_secs, vec![3600, 86400]);
        assert_eq!(config.labeling.amount_side, AmountSide::Ether);
        assert_eq!(config.output.dir, PathBuf::from("output_IDEX"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("washscan.toml");
        std::fs::write(&path, "[labeling]\nmargin = 0.25\n").unwrap();

        let env: config::Map<String, String> = [
            ("WASH_LABELING__MARGIN", "0.2"),
            ("WASH_LABELING__WINDOW_SIZES_SECS", "3600,86400"),
            ("WASH_DETECTION__MIN_OCCURRENCE", "5"),
            ("WASH_OUTPUT__DIR", "out"),
            ("OTHER_LABELING__MARGIN", "0.9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::load_with_env(&path, Some(env)).unwrap();
        assert_eq!(config.labeling.margin, 0.2);
        assert_eq!(config.labeling.window_sizes_secs, vec![3600, 86400]);
        assert_eq!(config.detection.min_occurrence, 5);
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.labeling.margin = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.labeling.window_sizes_secs = vec![];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.labeling.window_sizes_secs = vec![3600, 0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detection.max_peel_iterations = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_mentions_windows() {
        let display = Config::default().display();
        assert!(display.contains("604800"));
        assert!(display.contains("token"));
    }
}
