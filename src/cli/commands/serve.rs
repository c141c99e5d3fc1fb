//! Serve command implementation

use crate::cli::args::ServeArgs;
use crate::cli::logging::{log, LogLevel};
use crate::gan::CriticConfig;
use crate::infer::Detector;
use crate::server::{self, ServerConfig};

pub fn run_serve(args: ServeArgs, level: LogLevel) -> Result<(), String> {
    let config = CriticConfig { features: args.features, ..Default::default() };

    log(level, LogLevel::Normal, &format!("Loading critic from {}", args.checkpoint.display()));
    let detector = Detector::load(&args.checkpoint, config, args.threshold)
        .map_err(|e| format!("Model error: {e}"))?;

    let addr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| format!("Invalid address: {e}"))?;
    let mut server_config = ServerConfig::default().with_address(addr);
    if args.no_cors {
        server_config = server_config.without_cors();
    }

    log(level, LogLevel::Normal, &format!("Serving on http://{addr}/api/detect-image"));
    log(level, LogLevel::Verbose, &format!("  Health:  http://{addr}/health"));
    log(level, LogLevel::Verbose, &format!("  Reload:  http://{addr}/admin/reload-model"));

    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Runtime error: {e}"))?;
    runtime
        .block_on(server::run(detector, server_config))
        .map_err(|e| format!("Server error: {e}"))
}
