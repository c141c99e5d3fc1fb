//! CLI module
//!
//! Command handlers and argument types for the `discernir` binary.

mod args;
mod commands;
mod logging;

pub use args::{apply_overrides, parse_args, Cli, Command, EvaluateArgs, ServeArgs, TrainArgs, ValidateArgs};
pub use commands::run_command;
pub use logging::LogLevel;
