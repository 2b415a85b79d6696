//! 외부 스캐너 실행
//!
//! trivy / grype를 자식 프로세스로 실행하여 리포트를 임시 파일에 쓰게 하고,
//! 실행 전후의 시각과 리포트 바이트를 [`ScanOutput`]으로 돌려줍니다.
//!
//! ```text
//! ScanRunner::run(kind, image, format)
//!   ├─ trivy --debug image --timeout 15m --offline-scan -f json -o <tmp> <image>
//!   │    └─ trivy --version -f json  (버전 / DB 갱신 시각)
//!   └─ grype -v -o json --file <tmp> <image>
//! ```

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use chrono::{DateTime, Utc};
use metrics::histogram;
use rumble_core::metrics as m;
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::config::ScannerConfig;
use crate::error::ScannerError;
use crate::report::{ScanReport, ScannerVersion, TrivyVersion};
use crate::types::ScannerKind;

/// 스캐너 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// 스캐너 네이티브 JSON (요약 생성 가능)
    Json,
    /// SARIF (attestation 전용, 요약 없음)
    Sarif,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sarif => "sarif",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캐너 실행 결과
#[derive(Debug)]
pub struct ScanOutput {
    pub kind: ScannerKind,
    pub format: ReportFormat,
    pub image: String,
    /// 리포트가 기록된 임시 파일 (drop 시 삭제)
    pub report_file: NamedTempFile,
    pub report: Vec<u8>,
    /// trivy 버전 조회 결과 (grype는 리포트 안에 포함)
    pub version: Option<ScannerVersion>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanOutput {
    /// JSON 리포트를 파싱합니다. SARIF 출력이면 `None`을 반환합니다.
    pub fn parse_report(&self) -> Result<Option<ScanReport>, ScannerError> {
        if self.format == ReportFormat::Sarif {
            return Ok(None);
        }
        let report = ScanReport::parse(self.kind, &self.report)?;
        Ok(Some(match &self.version {
            Some(v) => report.with_version(v.clone()),
            None => report,
        }))
    }
}

/// 외부 스캐너 실행기
#[derive(Debug, Clone)]
pub struct ScanRunner {
    config: ScannerConfig,
}

impl ScanRunner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// 스캐너를 실행하고 리포트를 읽어옵니다.
    ///
    /// # Errors
    ///
    /// 임시 파일 생성, 프로세스 실행, 리포트 읽기 중 하나라도 실패하면 에러를 반환합니다.
    /// 스캐너가 0이 아닌 종료 코드로 끝나면 `Process` 에러입니다.
    pub async fn run(
        &self,
        kind: ScannerKind,
        image: &str,
        format: ReportFormat,
    ) -> Result<ScanOutput, ScannerError> {
        let report_file = tempfile::Builder::new()
            .prefix(&format!("{kind}-scan-"))
            .tempfile()
            .map_err(|e| ScannerError::io(std::env::temp_dir(), e))?;

        let program = self.config.binary_for(kind).to_owned();
        let args = scan_args(kind, format, report_file.path(), image, &self.config.trivy_timeout);
        tracing::info!(scanner = %kind, %image, %format, command = %format!("{program} {}", args.join(" ")), "running scan");

        let started_at = Utc::now();
        let status = command(&program, self.config.docker_config.as_deref())
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ScannerError::Process {
                program: program.clone(),
                reason: e.to_string(),
            })?;
        let finished_at = Utc::now();

        let elapsed = (finished_at - started_at).num_milliseconds() as f64 / 1000.0;
        histogram!(m::SCANNER_SCAN_DURATION_SECONDS, m::LABEL_SCANNER => kind.as_str()).record(elapsed);

        if !status.success() {
            return Err(ScannerError::Process {
                program,
                reason: format!("exited with {status}"),
            });
        }

        let report = tokio::fs::read(report_file.path())
            .await
            .map_err(|e| ScannerError::io(report_file.path(), e))?;
        tracing::debug!(scanner = %kind, bytes = report.len(), elapsed_secs = elapsed, "scan finished");

        let version = match kind {
            ScannerKind::Trivy => Some(self.trivy_version().await?),
            ScannerKind::Grype => None,
        };

        Ok(ScanOutput {
            kind,
            format,
            image: image.to_owned(),
            report_file,
            report,
            version,
            started_at,
            finished_at,
        })
    }

    /// `trivy --version -f json`으로 버전과 DB 갱신 시각을 조회합니다.
    pub async fn trivy_version(&self) -> Result<ScannerVersion, ScannerError> {
        let program = &self.config.trivy_binary;
        let output = command(program, self.config.docker_config.as_deref())
            .args(["--version", "-f", "json"])
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| ScannerError::Process {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ScannerError::Process {
                program: program.clone(),
                reason: format!("version query exited with {}", output.status),
            });
        }

        Ok(TrivyVersion::parse(&output.stdout)?.into())
    }
}

/// 스캐너 명령행 인자를 생성합니다.
pub fn scan_args(
    kind: ScannerKind,
    format: ReportFormat,
    output: &Path,
    image: &str,
    trivy_timeout: &str,
) -> Vec<String> {
    let output = output.display().to_string();
    match kind {
        ScannerKind::Trivy => vec![
            "--debug".to_owned(),
            "image".to_owned(),
            "--timeout".to_owned(),
            trivy_timeout.to_owned(),
            "--offline-scan".to_owned(),
            "-f".to_owned(),
            format.as_str().to_owned(),
            "-o".to_owned(),
            output,
            image.to_owned(),
        ],
        ScannerKind::Grype => vec![
            "-v".to_owned(),
            "-o".to_owned(),
            format.as_str().to_owned(),
            "--file".to_owned(),
            output,
            image.to_owned(),
        ],
    }
}

/// `DOCKER_CONFIG`가 설정된 자식 프로세스 명령을 만듭니다.
pub(crate) fn command(program: &str, docker_config: Option<&Path>) -> Command {
    let mut cmd = Command::new(program);
    if let Some(dir) = docker_config {
        cmd.env("DOCKER_CONFIG", dir);
    }
    cmd.kill_on_drop(true);
    cmd
}
