//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rumble_scanner::ScannerKind;

/// Default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "rumble.toml";

/// rumble -- container image vulnerability scanning.
///
/// Use `rumble <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "rumble", version, about, long_about = None)]
pub struct Cli {
    /// Path to the rumble.toml configuration file (default: ./rumble.toml if present).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Supported scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScannerChoice {
    Trivy,
    Grype,
}

impl From<ScannerChoice> for ScannerKind {
    fn from(choice: ScannerChoice) -> Self {
        match choice {
            ScannerChoice::Trivy => ScannerKind::Trivy,
            ScannerChoice::Grype => ScannerKind::Grype,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan an image, print the summary and store it.
    Scan(ScanArgs),

    /// Show the latest stored scan per image.
    Latest(LatestArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Scan a container image with trivy or grype.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Image reference to scan.
    #[arg(short, long)]
    pub image: String,

    /// Scanner to use (default: `[scan] scanner` from config).
    #[arg(short, long)]
    pub scanner: Option<ScannerChoice>,

    /// Produce a SARIF report and attach it to the image with cosign.
    #[arg(long)]
    pub attest: bool,

    /// Do not write the summary to the store.
    #[arg(long)]
    pub no_store: bool,

    /// Invocation URI recorded in the attestation.
    #[arg(long)]
    pub invocation_uri: Option<String>,

    /// Invocation event ID recorded in the attestation.
    #[arg(long)]
    pub invocation_event_id: Option<String>,

    /// Invocation builder ID recorded in the attestation.
    #[arg(long)]
    pub invocation_builder_id: Option<String>,

    /// DOCKER_CONFIG directory passed to the scanner and cosign.
    #[arg(long)]
    pub docker_config: Option<PathBuf>,

    /// Image build time (RFC 3339). Defaults to the Unix epoch.
    #[arg(long)]
    pub created: Option<DateTime<Utc>>,
}

// ---- latest ----

/// Report the latest stored scan for every image.
#[derive(Args, Debug)]
pub struct LatestArgs {
    /// Scanner whose rows are queried.
    #[arg(short, long, default_value = "grype")]
    pub scanner: ScannerChoice,
}

// ---- config ----

/// Manage rumble configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scan, store, attest).
        #[arg(long)]
        section: Option<String>,
    },
}
