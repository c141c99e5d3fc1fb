//! Validate command implementation

use crate::cli::args::ValidateArgs;
use crate::cli::logging::{log, LogLevel};
use crate::config::load_manifest;

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    let manifest = load_manifest(&args.config).map_err(|e| format!("Config error: {e}"))?;

    log(level, LogLevel::Normal, &format!("{} is valid", args.config.display()));
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  z_dim={}, features=({}, {}), image_size={}",
            manifest.gan.generator.z_dim,
            manifest.gan.generator.features,
            manifest.gan.critic.features,
            manifest.gan.critic.image_size
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!("  Checkpoints to {}", manifest.output.dir.display()),
    );
    Ok(())
}
