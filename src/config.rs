use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

// ---------------------------------------------------------------------------
// SplitOrder – how a category's rows are ordered before slicing
// ---------------------------------------------------------------------------

/// Ordering applied to each category's pool before it is cut into
/// train / val / test slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SplitOrder {
    /// Keep load order: the first rows go to train, then val, then test.
    #[default]
    LoadOrder,
    /// Permute each category with a seeded ChaCha8 stream first.
    Shuffled { seed: u64 },
}

// ---------------------------------------------------------------------------
// PrepConfig – explicit, immutable per-call configuration
// ---------------------------------------------------------------------------

/// Configuration of one pipeline invocation.
///
/// | field         | default       |
/// |---------------|---------------|
/// | `train_ratio` | `0.8`         |
/// | `test_ratio`  | `0.13`        |
/// | `verbose`     | `true`        |
/// | `rescale`     | `true`        |
/// | `split_order` | `LoadOrder`   |
///
/// `val_ratio` is implied: `1 - train_ratio - test_ratio`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub train_ratio: f64,
    pub test_ratio: f64,
    /// Raises diagnostics from `debug` to `info`. No behavioural effect.
    pub verbose: bool,
    /// When false the partitions are returned unnormalised.
    pub rescale: bool,
    pub split_order: SplitOrder,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            test_ratio: 0.13,
            verbose: true,
            rescale: true,
            split_order: SplitOrder::LoadOrder,
        }
    }
}

impl PrepConfig {
    /// Load a config from a JSON file; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PrepConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Fraction of every category assigned to validation.
    pub fn val_ratio(&self) -> f64 {
        1.0 - self.train_ratio - self.test_ratio
    }

    /// Check the ratio invariants.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |r: f64| r > 0.0 && r < 1.0;
        if !in_unit(self.train_ratio) {
            return Err(PrepError::configuration(format!(
                "train_ratio must lie in (0, 1), got {}",
                self.train_ratio
            )));
        }
        if !in_unit(self.test_ratio) {
            return Err(PrepError::configuration(format!(
                "test_ratio must lie in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.train_ratio + self.test_ratio >= 1.0 {
            return Err(PrepError::configuration(format!(
                "train_ratio + test_ratio must be < 1, got {} + {}",
                self.train_ratio, self.test_ratio
            )));
        }
        Ok(())
    }

    /// Log level used for diagnostics under this config.
    pub(crate) fn diagnostic_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}
