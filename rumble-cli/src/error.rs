//! CLI-specific error types and exit code mapping

use rumble_core::error::RumbleError;
use rumble_scanner::ScannerError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from rumble-core.
    #[error("{0}")]
    Core(#[from] RumbleError),

    /// Scanner, normalizer, store or attestation failure.
    #[error("scan error: {0}")]
    Scan(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success                                   |
    /// | 1    | General / command / scan error            |
    /// | 2    | Configuration error                       |
    /// | 10   | IO error                                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(RumbleError::Config(_)) => 2,
            Self::Io(_) | Self::Core(RumbleError::Io(_)) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Scan(_) => 1,
        }
    }
}

impl From<ScannerError> for CliError {
    fn from(e: ScannerError) -> Self {
        match e {
            ScannerError::Config { .. } => Self::Config(e.to_string()),
            ScannerError::Io { source, .. } => Self::Io(source),
            other => Self::Scan(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumble_core::error::{ConfigError, ScanError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_core_config_error() {
        let err = CliError::Core(RumbleError::Config(ConfigError::FileNotFound {
            path: "rumble.toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2, "core config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_scan_error() {
        let err = CliError::Scan("digest missing".to_owned());
        assert_eq!(err.exit_code(), 1, "scan error should return exit code 1");
    }

    #[test]
    fn test_exit_code_core_scan_error() {
        let err = CliError::Core(RumbleError::Scan(ScanError::Process("exit 1".to_owned())));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1, "command error should return exit code 1");
    }

    #[test]
    fn test_exit_code_json_serialize_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json")
            .expect_err("should fail parsing");
        let err = CliError::JsonSerialize(json_err);
        assert_eq!(err.exit_code(), 1, "json serialize error should return exit code 1");
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display_str = format!("{}", err);
        assert!(display_str.contains("configuration error"));
        assert!(display_str.contains("invalid TOML syntax"));
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(format!("{}", err), "execution failed");
    }

    #[test]
    fn test_from_scanner_config_error() {
        let err: CliError = ScannerError::Config {
            field: "trivy_timeout".to_owned(),
            reason: "bad".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_from_scanner_io_error() {
        let err: CliError = ScannerError::io(
            "/tmp/report.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        match err {
            CliError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            _ => panic!("expected Io error variant"),
        }
    }

    #[test]
    fn test_from_scanner_digest_missing() {
        let err: CliError = ScannerError::DigestMissing {
            scanner: "grype".to_owned(),
            image: "local:dev".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::Scan(_)));
        assert!(err.to_string().contains("local:dev"));
    }
}
