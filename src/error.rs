//! Error types with actionable diagnostics.
//!
//! Every variant carries enough context to act on without consulting logs:
//! shape mismatches name the offending tensor, training instability reports
//! the epoch/step/loss where it was detected.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for discernir operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across training, checkpointing and inference.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found at expected path.
    #[error("Configuration file not found: {path}\n  → Create a manifest or pass a different path")]
    ConfigNotFound { path: PathBuf },

    /// Configuration file has invalid syntax.
    #[error("Invalid configuration syntax in {path}:\n  {message}\n  → Check YAML syntax at the indicated line")]
    ConfigParsing { path: PathBuf, message: String },

    /// Configuration value is invalid.
    #[error("Invalid configuration value for '{field}': {message}\n  → {suggestion}")]
    ConfigValue {
        field: String,
        message: String,
        suggestion: String,
    },

    /// Image payload could not be decoded into a valid RGB image.
    #[error("Image decode failed: {message}")]
    Decode { message: String },

    /// Checkpoint tensor incompatible with the instantiated architecture.
    #[error("Tensor shape mismatch for '{name}': expected {expected:?}, got {actual:?}\n  → The checkpoint was produced by a different architecture configuration")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// NaN/Inf loss during training. Fatal: indicates instability that
    /// requires hyperparameter intervention, not an automatic retry.
    #[error("Numeric instability at epoch {epoch}, step {step}: loss = {loss}\n  → Lower the learning rate or raise the gradient penalty coefficient")]
    NumericInstability { epoch: usize, step: usize, loss: f32 },

    /// Corrupt or unreadable training sample. Recoverable: the data loader
    /// skips the sample and continues.
    #[error("Failed to load training sample {path}: {message}")]
    DataLoad { path: PathBuf, message: String },

    /// Checkpoint file unreadable or unwritable.
    #[error("Checkpoint I/O failed for {path}: {message}")]
    CheckpointIo { path: PathBuf, message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Whether this error is caused by user input (maps to a 4xx-class
    /// response at the service boundary) rather than an internal failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParsing { .. }
                | Self::ConfigValue { .. }
                | Self::Decode { .. }
        )
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound { .. } => "E001",
            Self::ConfigParsing { .. } => "E002",
            Self::ConfigValue { .. } => "E003",
            Self::Io { .. } => "E050",
            Self::Serialization { .. } => "E051",
            Self::Decode { .. } => "E100",
            Self::ShapeMismatch { .. } => "E110",
            Self::NumericInstability { .. } => "E120",
            Self::DataLoad { .. } => "E130",
            Self::CheckpointIo { .. } => "E140",
        }
    }
}
