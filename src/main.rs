//! Discernir CLI
//!
//! Single-command entry point for the discernir library.
//!
//! # Usage
//!
//! ```bash
//! # Train from a manifest
//! discernir train run.yaml
//!
//! # Train with overrides
//! discernir train run.yaml --epochs 10 --lr 0.0001
//!
//! # Validate a manifest
//! discernir validate run.yaml
//!
//! # Evaluate a checkpoint on held-out data
//! discernir evaluate models/critic.safetensors datasets/test
//!
//! # Serve the detector
//! discernir serve models/critic.safetensors --port 5001
//! ```

use clap::Parser;
use discernir::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
