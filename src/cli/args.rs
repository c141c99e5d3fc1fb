//! CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::TrainManifest;

/// Discernir: WGAN-GP face-forgery critic
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "discernir")]
#[command(version)]
#[command(about = "Train a WGAN-GP face-forgery critic and serve it over HTTP")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train from a YAML manifest
    Train(TrainArgs),

    /// Validate a manifest without training
    Validate(ValidateArgs),

    /// Evaluate a critic checkpoint on a labeled real/fake directory
    Evaluate(EvaluateArgs),

    /// Serve a critic checkpoint over HTTP
    Serve(ServeArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML manifest
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override checkpoint output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Validate the manifest and print the plan without training
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML manifest
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the evaluate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct EvaluateArgs {
    /// Critic checkpoint file
    #[arg(value_name = "CHECKPOINT")]
    pub checkpoint: PathBuf,

    /// Directory with real/ and fake/ subdirectories
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Decision threshold on the squashed score
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// Evaluation batch size
    #[arg(short, long, default_value_t = 64)]
    pub batch_size: usize,

    /// Critic feature-width base the checkpoint was trained with
    #[arg(long, default_value_t = crate::gan::FEATURES_CRITIC)]
    pub features: usize,
}

/// Arguments for the serve command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ServeArgs {
    /// Critic checkpoint file
    #[arg(value_name = "CHECKPOINT")]
    pub checkpoint: PathBuf,

    /// Bind host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port
    #[arg(short, long, default_value_t = 5001)]
    pub port: u16,

    /// Decision threshold on the squashed score
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// Critic feature-width base the checkpoint was trained with
    #[arg(long, default_value_t = crate::gan::FEATURES_CRITIC)]
    pub features: usize,

    /// Disable CORS
    #[arg(long)]
    pub no_cors: bool,
}

/// Apply command-line overrides to a manifest
pub fn apply_overrides(manifest: &mut TrainManifest, args: &TrainArgs) {
    if let Some(output_dir) = &args.output_dir {
        manifest.output.dir = output_dir.clone();
    }
    if let Some(epochs) = args.epochs {
        manifest.gan.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        manifest.gan.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        manifest.gan.learning_rate = lr;
    }
    if let Some(seed) = args.seed {
        manifest.output.seed = Some(seed);
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
