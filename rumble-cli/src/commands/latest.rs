//! `rumble latest` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use rumble_core::config::RumbleConfig;
use rumble_scanner::{JsonlStore, LatestScanReport, ScannerKind, query_latest};

use crate::cli::LatestArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `latest` command.
///
/// Rows that cannot be read or decoded are reported alongside the
/// successful entries, and the command then exits non-zero.
pub async fn execute(
    args: LatestArgs,
    config: &RumbleConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    if !config.store.enabled {
        return Err(CliError::Config(
            "store is disabled; enable [store] to query the latest scans".to_owned(),
        ));
    }

    let scanner = ScannerKind::from(args.scanner);
    let store = JsonlStore::from_config(&config.store);
    info!(%scanner, path = %store.scans_path().display(), "querying latest scans");

    let report = LatestCommandReport {
        scanner: scanner.to_string(),
        report: query_latest(&store, scanner).await?,
    };
    writer.render(&report)?;

    let failed = report.report.failures.len();
    if failed > 0 {
        return Err(CliError::Command(format!(
            "{failed} stored row(s) could not be read or decoded"
        )));
    }

    Ok(())
}

/// Latest-scan output.
#[derive(Serialize)]
pub struct LatestCommandReport {
    pub scanner: String,
    #[serde(flatten)]
    pub report: LatestScanReport,
}

impl Render for LatestCommandReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for entry in &self.report.entries {
            writeln!(w, "{entry}")?;
        }

        writeln!(
            w,
            "Processed {} images ({} scanner)",
            self.report.processed, self.scanner
        )?;

        for failure in &self.report.failures {
            writeln!(
                w,
                "  {} {} ({}): {}",
                "FAILED".red().bold(),
                failure.image,
                failure.row_id,
                failure.reason.red()
            )?;
        }

        Ok(())
    }
}
