//! Training manifest
//!
//! A YAML file describing one training run: network dimensions, optimizer
//! hyperparameters, dataset locations and checkpoint policy. All values are
//! fixed at start time; the CLI can override a handful of them.
//!
//! ```yaml
//! gan:
//!   learning_rate: 0.0001
//!   batch_size: 256
//!   epochs: 20
//! data:
//!   train_dir: datasets/real-vs-fake/train
//!   eval_dir: datasets/real-vs-fake/test
//! output:
//!   dir: models
//!   versioned_checkpoints: false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gan::GanConfig;
use crate::{Error, Result};

/// Dataset locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    /// Directory with `real/` (and optionally `fake/`) training images
    pub train_dir: PathBuf,
    /// Held-out `real/` + `fake/` directory for per-epoch evaluation
    #[serde(default)]
    pub eval_dir: Option<PathBuf>,
}

/// Checkpoint output policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory receiving checkpoint files
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Keep one checkpoint pair per epoch instead of overwriting
    #[serde(default)]
    pub versioned_checkpoints: bool,
    /// Fixed seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("models")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir(), versioned_checkpoints: false, seed: None }
    }
}

/// Deployed-classifier settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceConfig {
    /// Decision threshold on the squashed score
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    0.5
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { threshold: default_threshold() }
    }
}

/// One complete training run description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainManifest {
    /// Network and optimizer hyperparameters
    #[serde(default)]
    pub gan: GanConfig,
    /// Dataset locations
    pub data: DataConfig,
    /// Checkpoint policy
    #[serde(default)]
    pub output: OutputConfig,
    /// Deployed-classifier settings
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl TrainManifest {
    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.gan.validate()?;
        if !(0.0..=1.0).contains(&self.inference.threshold) {
            return Err(Error::ConfigValue {
                field: "inference.threshold".into(),
                message: "must lie in [0, 1]".into(),
                suggestion: "The squashed score is a probability-like value; 0.5 is the default"
                    .into(),
            });
        }
        Ok(())
    }
}

/// Load and validate a manifest from a YAML file
pub fn load_manifest(path: &Path) -> Result<TrainManifest> {
    if !path.exists() {
        return Err(Error::ConfigNotFound { path: path.to_path_buf() });
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    let manifest: TrainManifest = serde_yaml::from_str(&content)
        .map_err(|e| Error::ConfigParsing { path: path.to_path_buf(), message: e.to_string() })?;
    manifest.validate()?;
    Ok(manifest)
}
