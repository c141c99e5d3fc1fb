//! CLI command handlers

mod evaluate;
mod serve;
mod train;
mod validate;

use super::args::{Cli, Command};
use super::logging::LogLevel;

pub use evaluate::run_evaluate;
pub use serve::run_serve;
pub use train::run_train;
pub use validate::run_validate;

/// Dispatch a parsed CLI invocation
pub fn run_command(cli: Cli) -> Result<(), String> {
    let level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Command::Train(args) => run_train(args, level),
        Command::Validate(args) => run_validate(args, level),
        Command::Evaluate(args) => run_evaluate(args, level),
        Command::Serve(args) => run_serve(args, level),
    }
}
