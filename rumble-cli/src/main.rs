//! rumble CLI -- container image vulnerability scanning.
//!
//! Runs trivy or grype against an image, normalizes the report into a
//! severity summary, stores it, attests SARIF results with cosign and
//! reports the latest scan per image.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use rumble_core::config::GeneralConfig;

use crate::cli::{Cli, Commands};
use crate::commands::{env_lookup, load_config};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let loaded = load_config(cli.config.as_deref(), env_lookup).await;

    // Logging comes up even when the config is broken so `config validate` can report it.
    let mut general = loaded
        .as_ref()
        .map(|l| l.config.general.clone())
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Some(ref level) = cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("warning: {e}");
    }
    rumble_core::metrics::describe_all();

    tracing::debug!(command = ?cli.command, "rumble starting");

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => {
            commands::config::execute(args, cli.config.as_deref(), &writer).await
        }
        Commands::Scan(args) => {
            let loaded = loaded?;
            commands::scan::execute(args, &loaded.config, &writer).await
        }
        Commands::Latest(args) => {
            let loaded = loaded?;
            commands::latest::execute(args, &loaded.config, &writer).await
        }
    }
}
