//! iotmig - Move devices from an IoT Core registry into IoT Enterprise
//!
//! The CLI:
//! - Collects connection settings from flags, `IOTMIG_*` variables or prompts
//! - Copies every device, its public keys and optionally a per-device role
//! - Writes a CSV report of the devices that could not be migrated

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;
mod input;
mod interactive;
mod output;
mod progress;

use error::CliResult;

/// iotmig - IoT device registry migration
#[derive(Parser)]
#[command(name = "iotmig")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate devices from a source registry to an IoT Enterprise system
    Migrate(config::MigrateArgs),

    /// Print the tool version
    Version,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args).await,
        Commands::Version => commands::version::execute(),
    }
}
