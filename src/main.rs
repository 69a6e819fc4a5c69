//! ionos-module - Run IONOS Cloud modules from the command line
//!
//! This is the main entry point for the CLI. The module result is written to
//! stdout; logs go to stderr.

use anyhow::Result;
use ionos_cloud_modules::cli::commands::{CommandContext, Runnable};
use ionos_cloud_modules::cli::{Cli, Commands};
use ionos_cloud_modules::config::Settings;
use ionos_cloud_modules::modules::ModuleOutput;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), cli.log_json);
    debug!(version = VERSION, "starting");

    // Load settings, falling back to the defaults
    let settings = Settings::load(cli.config.as_ref()).unwrap_or_else(|e| {
        warn!("Failed to load settings: {:#}", e);
        Settings::default()
    });

    let ctx = CommandContext::new(&cli, settings);

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Run(args) => args.run(&ctx),
        Commands::List(args) => args.run(&ctx),
        Commands::Describe(args) => args.run(&ctx),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(error) => {
            // Errors before the module ran still produce a failed result
            ctx.output.print(&ModuleOutput::failed(error.to_string()))?;
            error.exit_code()
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 3),
            )
            .init();
    }
}
