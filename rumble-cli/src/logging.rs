//! Logging setup for the `rumble` binary.
//!
//! stdout is reserved for the rendered command output (text or JSON), so
//! every log line goes to stderr. `rumble scan --output json | jq` therefore
//! sees only the report, while the scanner progress and warnings stay visible.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rumble_core::config::GeneralConfig;

/// Build the level filter.
///
/// `RUST_LOG` wins when set. Otherwise `level` (from `[general] log_level`
/// or `--log-level`) must be a valid filter directive.
fn level_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}

/// Install the global subscriber on stderr.
///
/// `log_format` selects JSON lines (`json`, for CI logs) or the
/// human-oriented `pretty` layout.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = level_filter(&config.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("failed to install JSON log subscriber")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
            .context("failed to install pretty log subscriber")?,
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    }

    Ok(())
}
