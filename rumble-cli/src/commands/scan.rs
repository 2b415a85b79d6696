//! `rumble scan` command handler

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use rumble_core::config::RumbleConfig;
use rumble_scanner::{
    CosignAttestor, InTotoStatement, Invocation, JsonlStore, ReportFormat, ScanRunner,
    ScanSummary, ScannerConfig, ScannerKind, VulnerabilityRecord, persist_scan,
};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
///
/// Without `--attest` the JSON report is normalized into a summary, printed
/// and (unless disabled) appended to the store. With `--attest` a SARIF
/// report is produced, wrapped in an in-toto predicate and attached with cosign.
pub async fn execute(
    args: ScanArgs,
    config: &RumbleConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let scanner_config = build_scanner_config(&args, config)?;
    let kind = scanner_config.scanner;
    let runner = ScanRunner::new(scanner_config);

    if args.attest {
        return execute_attest(&args, config, &runner, writer).await;
    }

    let output = runner.run(kind, &args.image, ReportFormat::Json).await?;
    let report = output
        .parse_report()?
        .ok_or_else(|| CliError::Scan("scanner did not produce a JSON report".to_owned()))?;

    let mut summary = rumble_scanner::normalize(&report, output.started_at, &args.image)?
        .with_created(args.created.unwrap_or(DateTime::<Utc>::UNIX_EPOCH));

    let store_enabled = config.store.enabled && !args.no_store;
    if store_enabled {
        let store = JsonlStore::from_config(&config.store);
        let stored = persist_scan(&store, &mut summary, &report).await?;
        info!(
            image = %summary.image,
            path = %store.scans_path().display(),
            vulnerabilities = stored,
            "scan persisted"
        );
    } else {
        summary.assign_id();
    }
    let findings = rumble_scanner::extract_vulnerabilities(&report, &summary.id);

    let command_report = ScanCommandReport::from_summary(&summary, findings, store_enabled);
    writer.render(&command_report)?;

    Ok(())
}

/// Merge CLI flags over the `[scan]` section and validate the result.
fn build_scanner_config(args: &ScanArgs, config: &RumbleConfig) -> Result<ScannerConfig, CliError> {
    let mut scanner_config = ScannerConfig::from_core(config);
    if let Some(choice) = args.scanner {
        scanner_config.scanner = ScannerKind::from(choice);
    }
    if let Some(ref dir) = args.docker_config {
        scanner_config.docker_config = Some(dir.clone());
    }
    scanner_config.validate()?;
    Ok(scanner_config)
}

/// Invocation metadata: CLI flags first, then the `[attest]` section.
fn build_invocation(args: &ScanArgs, config: &RumbleConfig) -> Invocation {
    let attest = &config.attest;
    Invocation::new(
        args.invocation_uri
            .clone()
            .unwrap_or_else(|| attest.invocation_uri.clone()),
        args.invocation_event_id
            .clone()
            .unwrap_or_else(|| attest.invocation_event_id.clone()),
        args.invocation_builder_id
            .clone()
            .unwrap_or_else(|| attest.invocation_builder_id.clone()),
    )
}

async fn execute_attest(
    args: &ScanArgs,
    config: &RumbleConfig,
    runner: &ScanRunner,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let scanner_config = runner.config();
    let kind = scanner_config.scanner;

    let output = runner.run(kind, &args.image, ReportFormat::Sarif).await?;
    let statement = InTotoStatement::from_sarif(
        &output.report,
        build_invocation(args, config),
        output.started_at,
        output.finished_at,
    )?;

    let attestor = CosignAttestor::new(
        scanner_config.cosign_binary.clone(),
        scanner_config.docker_config.clone(),
    );
    attestor.attest(&args.image, &statement).await?;

    let report = AttestationReport {
        image: args.image.clone(),
        scanner: kind.to_string(),
        scanner_version: statement.scanner.version.clone(),
        invocation_uri: statement.invocation.uri.clone(),
        scan_started_on: statement.metadata.scan_started_on.clone(),
        scan_finished_on: statement.metadata.scan_finished_on.clone(),
    };
    writer.render(&report)?;

    Ok(())
}

/// Result of a normalizing scan.
#[derive(Serialize)]
pub struct ScanCommandReport {
    pub id: String,
    pub image: String,
    pub digest: String,
    pub scanner: String,
    pub scanner_version: String,
    pub scanner_db_version: String,
    pub time: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub severities: SeverityBreakdown,
    /// Number of entries in the scanner's match list.
    pub total: u64,
    pub stored: bool,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
}

/// Per-bucket counts in display order.
#[derive(Serialize, Default)]
pub struct SeverityBreakdown {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub negligible: u64,
    pub unknown: u64,
}

impl ScanCommandReport {
    pub fn from_summary(
        summary: &ScanSummary,
        vulnerabilities: Vec<VulnerabilityRecord>,
        stored: bool,
    ) -> Self {
        let counts = &summary.counts;
        Self {
            id: summary.id.clone(),
            image: summary.image.clone(),
            digest: summary.digest.clone(),
            scanner: summary.scanner.to_string(),
            scanner_version: summary.scanner_version.clone(),
            scanner_db_version: summary.scanner_db_version.clone(),
            time: summary.time,
            created: summary.created,
            severities: SeverityBreakdown {
                critical: counts.critical,
                high: counts.high,
                medium: counts.medium,
                low: counts.low,
                negligible: counts.negligible,
                unknown: counts.unknown,
            },
            total: summary.total,
            stored,
            vulnerabilities,
        }
    }
}

impl Render for ScanCommandReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scan: {}", self.image.bold())?;
        writeln!(w, "  ID:         {}", self.id)?;
        writeln!(w, "  Digest:     {}", self.digest)?;
        writeln!(
            w,
            "  Scanner:    {} {} (db {})",
            self.scanner, self.scanner_version, self.scanner_db_version
        )?;
        writeln!(w, "  Time:       {}", self.time.to_rfc3339())?;
        writeln!(w, "  Created:    {}", self.created.to_rfc3339())?;
        writeln!(w)?;

        let s = &self.severities;
        writeln!(w, "Vulnerabilities: {} matches", self.total)?;
        writeln!(w, "  {}: {}", "CRITICAL".red().bold(), s.critical)?;
        writeln!(w, "  {}: {}", "HIGH".red(), s.high)?;
        writeln!(w, "  {}: {}", "MEDIUM".yellow(), s.medium)?;
        writeln!(w, "  {}: {}", "LOW".blue(), s.low)?;
        writeln!(w, "  {}: {}", "NEGLIGIBLE".dimmed(), s.negligible)?;
        writeln!(w, "  {}: {}", "UNKNOWN".dimmed(), s.unknown)?;

        if !self.vulnerabilities.is_empty() {
            writeln!(w)?;
            for vuln in &self.vulnerabilities {
                write!(w, "  {vuln}")?;
                if let Some(ref suppression) = vuln.suppression {
                    write!(w, " {}", format!("[suppressed: {}]", suppression.reason).dimmed())?;
                }
                writeln!(w)?;
            }
        }

        if self.stored {
            writeln!(
                w,
                "\n{} summary and {} vulnerability rows",
                "Stored".green(),
                self.vulnerabilities.len()
            )?;
        } else {
            writeln!(w, "\n{}", "Not stored".dimmed())?;
        }

        Ok(())
    }
}

/// Result of an attesting scan.
#[derive(Serialize)]
pub struct AttestationReport {
    pub image: String,
    pub scanner: String,
    pub scanner_version: String,
    pub invocation_uri: String,
    pub scan_started_on: String,
    pub scan_finished_on: String,
}

impl Render for AttestationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Attested: {}", self.image.bold())?;
        writeln!(w, "  Scanner:  {} {}", self.scanner, self.scanner_version)?;
        if !self.invocation_uri.is_empty() {
            writeln!(w, "  Invoked:  {}", self.invocation_uri)?;
        }
        writeln!(
            w,
            "  Window:   {} .. {}",
            self.scan_started_on, self.scan_finished_on
        )?;
        writeln!(w, "  Result:   {}", "ATTESTED".green().bold())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::Parser;
    use rumble_scanner::SeverityCounts;

    use crate::cli::{Cli, Commands};

    fn scan_args(argv: &[&str]) -> ScanArgs {
        let mut full = vec!["rumble", "scan"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse succeeded").command {
            Commands::Scan(args) => args,
            _ => panic!("expected Scan command"),
        }
    }

    fn sample_summary() -> ScanSummary {
        let time = Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap();
        let mut summary = ScanSummary::new("alpine:3.19", ScannerKind::Grype, time);
        summary.id = "0b3c4e1e-6a5b-4f6e-9d0a-2f1c3b4a5d6e".to_owned();
        summary.digest = "sha256:eece".to_owned();
        summary.scanner_version = "0.73.4".to_owned();
        summary.scanner_db_version = "sha256:7b1f".to_owned();
        summary.success = true;
        summary.counts = SeverityCounts {
            low: 1,
            medium: 2,
            high: 3,
            critical: 4,
            negligible: 5,
            unknown: 6,
        };
        summary.total = 21;
        summary
    }

    fn sample_findings() -> Vec<VulnerabilityRecord> {
        let record = |cve: &str, severity: &str, fixed: &str| VulnerabilityRecord {
            scan_id: sample_summary().id,
            cve_id: cve.to_owned(),
            data_source: format!("https://nvd.nist.gov/vuln/detail/{cve}"),
            severity: severity.to_owned(),
            package_name: "openssl".to_owned(),
            installed_version: "3.1.4-r0".to_owned(),
            fixed_in_version: fixed.to_owned(),
            artifact_type: "apk".to_owned(),
            suppression: None,
        };
        let mut suppressed = record("CVE-2024-0727", "Medium", "");
        suppressed.suppression = Some(rumble_scanner::Suppression {
            url: None,
            reason: "PKCS12 parsing not used".to_owned(),
        });
        vec![record("CVE-2023-5678", "High", "3.1.4-r1"), suppressed]
    }

    #[test]
    fn test_scanner_flag_overrides_config() {
        let mut config = RumbleConfig::default();
        config.scan.scanner = "grype".to_owned();
        let args = scan_args(&["-i", "alpine", "-s", "trivy", "--docker-config", "/ci/.docker"]);

        let scanner_config = build_scanner_config(&args, &config).expect("valid config");
        assert_eq!(scanner_config.scanner, ScannerKind::Trivy);
        assert_eq!(
            scanner_config.docker_config.as_deref(),
            Some(std::path::Path::new("/ci/.docker"))
        );
    }

    #[test]
    fn test_scanner_defaults_to_config_section() {
        let mut config = RumbleConfig::default();
        config.scan.scanner = "trivy".to_owned();
        let args = scan_args(&["-i", "alpine"]);

        let scanner_config = build_scanner_config(&args, &config).expect("valid config");
        assert_eq!(scanner_config.scanner, ScannerKind::Trivy);
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let mut config = RumbleConfig::default();
        config.scan.trivy_timeout = "soon".to_owned();
        let args = scan_args(&["-i", "alpine"]);

        let err = build_scanner_config(&args, &config).expect_err("timeout should be rejected");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_invocation_flags_override_attest_section() {
        let mut config = RumbleConfig::default();
        config.attest.invocation_uri = "https://ci.example.com/from-config".to_owned();
        config.attest.invocation_builder_id = "config-builder".to_owned();
        let args = scan_args(&["-i", "alpine", "--invocation-uri", "https://ci.example.com/run/7"]);

        let invocation = build_invocation(&args, &config);
        assert_eq!(invocation.uri, "https://ci.example.com/run/7");
        assert_eq!(invocation.builder_id, "config-builder");
        assert!(invocation.parameters.is_none());
    }

    #[test]
    fn test_scan_report_render_text() {
        let report = ScanCommandReport::from_summary(&sample_summary(), sample_findings(), true);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("alpine:3.19"));
        assert!(output.contains("sha256:eece"));
        assert!(output.contains("21 matches"));
        assert!(output.contains("CVE-2023-5678 [High] openssl@3.1.4-r0 (fixed in 3.1.4-r1)"));
        assert!(output.contains("suppressed: PKCS12 parsing not used"));
        assert!(output.contains("2 vulnerability rows"));
    }

    #[test]
    fn test_scan_report_not_stored() {
        let report = ScanCommandReport::from_summary(&sample_summary(), Vec::new(), false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Not stored"));
    }

    #[test]
    fn test_scan_report_json_fields() {
        let report = ScanCommandReport::from_summary(&sample_summary(), sample_findings(), true);
        let json = serde_json::to_value(&report).expect("JSON serialization should succeed");

        assert_eq!(json["scanner"].as_str(), Some("grype"));
        assert_eq!(json["severities"]["critical"].as_u64(), Some(4));
        assert_eq!(json["severities"]["negligible"].as_u64(), Some(5));
        assert_eq!(json["severities"]["unknown"].as_u64(), Some(6));
        assert_eq!(json["created"].as_str(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(json["vulnerabilities"].as_array().map(Vec::len), Some(2));
        assert_eq!(
            json["vulnerabilities"][1]["suppression"]["reason"].as_str(),
            Some("PKCS12 parsing not used")
        );
    }

    #[test]
    fn test_attestation_report_render_text() {
        let report = AttestationReport {
            image: "ghcr.io/org/app:1".to_owned(),
            scanner: "trivy".to_owned(),
            scanner_version: "0.48.3".to_owned(),
            invocation_uri: String::new(),
            scan_started_on: "2024-02-01T06:00:00Z".to_owned(),
            scan_finished_on: "2024-02-01T06:01:00Z".to_owned(),
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("ATTESTED"));
        assert!(!output.contains("Invoked"), "empty invocation uri is omitted");
    }
}
