//! 스캔 결과 attestation
//!
//! SARIF 리포트를 cosign 취약점 predicate(in-toto statement) 형태로 감싸고,
//! `cosign attest`로 이미지에 서명된 attestation을 첨부합니다.
//! 이후 `cosign verify-attestation`으로 검증하지만, 비공개 이미지 등에서는
//! 검증이 불가능할 수 있으므로 실패해도 경고만 남깁니다.

use std::path::Path;
use std::process::Stdio;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScannerError;
use crate::runner::command;

/// cosign 취약점 attestation 타입
pub const ATTESTATION_TYPE_VULN: &str = "https://cosign.sigstore.dev/attestation/vuln/v1";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// SARIF 리포트에서 필요한 부분
#[derive(Debug, Clone, Deserialize)]
pub struct SarifOutput {
    #[serde(default)]
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SarifRun {
    pub tool: SarifTool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifDriver {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub information_uri: String,
}

/// 스캔을 실행한 주체 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub parameters: Option<serde_json::Value>,
    pub uri: String,
    pub event_id: String,
    #[serde(rename = "builder.id")]
    pub builder_id: String,
}

impl Invocation {
    pub fn new(
        uri: impl Into<String>,
        event_id: impl Into<String>,
        builder_id: impl Into<String>,
    ) -> Self {
        Self {
            parameters: None,
            uri: uri.into(),
            event_id: event_id.into(),
            builder_id: builder_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub uri: String,
    pub version: String,
    /// 원본 SARIF 문서
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub scan_started_on: String,
    pub scan_finished_on: String,
}

/// cosign 취약점 predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InTotoStatement {
    pub invocation: Invocation,
    pub scanner: ScannerInfo,
    pub metadata: ScanMetadata,
}

impl InTotoStatement {
    /// SARIF 리포트와 실행 정보로 predicate를 만듭니다.
    ///
    /// # Errors
    ///
    /// SARIF가 JSON이 아니거나 `runs`가 비어 있으면 `MalformedReport`를 반환합니다.
    pub fn from_sarif(
        sarif: &[u8],
        invocation: Invocation,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    ) -> Result<Self, ScannerError> {
        let parsed: SarifOutput =
            serde_json::from_slice(sarif).map_err(|e| ScannerError::malformed("sarif", e.to_string()))?;
        let driver = match parsed.runs.first() {
            Some(run) => &run.tool.driver,
            None => return Err(ScannerError::malformed("sarif", "report has no runs")),
        };
        let result: serde_json::Value =
            serde_json::from_slice(sarif).map_err(|e| ScannerError::malformed("sarif", e.to_string()))?;

        Ok(Self {
            invocation,
            scanner: ScannerInfo {
                uri: driver.information_uri.clone(),
                version: driver.version.clone(),
                result,
            },
            metadata: ScanMetadata {
                scan_started_on: started.format(TIME_FORMAT).to_string(),
                scan_finished_on: finished.format(TIME_FORMAT).to_string(),
            },
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, ScannerError> {
        serde_json::to_string_pretty(self).map_err(|e| ScannerError::Attestation(e.to_string()))
    }
}

/// `cosign attest` 인자
pub fn attest_args(predicate: &Path, image: &str) -> Vec<String> {
    vec![
        "attest".to_owned(),
        "--yes".to_owned(),
        "--type".to_owned(),
        ATTESTATION_TYPE_VULN.to_owned(),
        "--predicate".to_owned(),
        predicate.display().to_string(),
        image.to_owned(),
    ]
}

/// `cosign verify-attestation` 인자
pub fn verify_args(image: &str) -> Vec<String> {
    vec![
        "verify-attestation".to_owned(),
        "--type".to_owned(),
        ATTESTATION_TYPE_VULN.to_owned(),
        "--certificate-identity-regexp".to_owned(),
        ".*".to_owned(),
        "--certificate-oidc-issuer-regexp".to_owned(),
        ".*".to_owned(),
        image.to_owned(),
    ]
}

/// cosign으로 attestation을 첨부하는 실행기
#[derive(Debug, Clone)]
pub struct CosignAttestor {
    binary: String,
    docker_config: Option<std::path::PathBuf>,
}

impl CosignAttestor {
    pub fn new(binary: impl Into<String>, docker_config: Option<std::path::PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            docker_config,
        }
    }

    /// predicate를 임시 파일에 기록하고 `cosign attest`를 실행한 뒤 검증을 시도합니다.
    ///
    /// # Errors
    ///
    /// predicate 기록 또는 `cosign attest`가 실패하면 `Attestation` 에러를 반환합니다.
    /// 검증 실패는 에러가 아닙니다.
    pub async fn attest(&self, image: &str, statement: &InTotoStatement) -> Result<(), ScannerError> {
        let predicate = tempfile::Builder::new()
            .prefix("rumble-predicate-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| ScannerError::io(std::env::temp_dir(), e))?;
        tokio::fs::write(predicate.path(), statement.to_json_pretty()?)
            .await
            .map_err(|e| ScannerError::io(predicate.path(), e))?;

        let args = attest_args(predicate.path(), image);
        tracing::info!(%image, command = %format!("{} {}", self.binary, args.join(" ")), "attesting scan results");
        let status = command(&self.binary, self.docker_config.as_deref())
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ScannerError::Attestation(format!("failed to run {}: {e}", self.binary)))?;
        if !status.success() {
            return Err(ScannerError::Attestation(format!(
                "{} attest exited with {status}",
                self.binary
            )));
        }

        let verify = command(&self.binary, self.docker_config.as_deref())
            .args(verify_args(image))
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .await;
        match verify {
            Ok(s) if s.success() => tracing::info!(%image, "attestation verified"),
            Ok(s) => tracing::warn!(%image, status = %s, "could not verify attestation (is this a private image?)"),
            Err(e) => tracing::warn!(%image, error = %e, "could not run attestation verification"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SARIF: &[u8] = br#"{
        "version": "2.1.0",
        "runs": [{"tool": {"driver": {"name": "Grype", "version": "0.74.0",
            "informationUri": "https://github.com/anchore/grype"}}, "results": []}]
    }"#;

    fn invocation() -> Invocation {
        Invocation::new("https://github.com/org/repo/actions/runs/1", "1", "https://github.com/org/repo")
    }

    #[test]
    fn statement_from_sarif() {
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let finished = Utc.with_ymd_and_hms(2024, 5, 1, 10, 2, 30).unwrap();
        let st = InTotoStatement::from_sarif(SARIF, invocation(), started, finished).unwrap();
        assert_eq!(st.scanner.uri, "https://github.com/anchore/grype");
        assert_eq!(st.scanner.version, "0.74.0");
        assert_eq!(st.metadata.scan_started_on, "2024-05-01T10:00:00Z");
        assert_eq!(st.metadata.scan_finished_on, "2024-05-01T10:02:30Z");
        assert_eq!(st.scanner.result["version"], "2.1.0");
    }

    #[test]
    fn statement_json_shape() {
        let now = Utc::now();
        let st = InTotoStatement::from_sarif(SARIF, invocation(), now, now).unwrap();
        let v: serde_json::Value = serde_json::from_str(&st.to_json_pretty().unwrap()).unwrap();
        assert!(v["invocation"]["parameters"].is_null());
        assert_eq!(v["invocation"]["builder.id"], "https://github.com/org/repo");
        assert_eq!(v["invocation"]["event_id"], "1");
        assert!(v["metadata"]["scanStartedOn"].is_string());
    }

    #[test]
    fn empty_runs_is_error() {
        let now = Utc::now();
        let err = InTotoStatement::from_sarif(br#"{"runs": []}"#, invocation(), now, now).unwrap_err();
        assert!(err.to_string().contains("no runs"));
    }

    #[test]
    fn cosign_args() {
        let args = attest_args(Path::new("/tmp/p.json"), "ghcr.io/org/app:1");
        assert_eq!(args[0], "attest");
        assert!(args.contains(&ATTESTATION_TYPE_VULN.to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("ghcr.io/org/app:1"));

        let args = verify_args("ghcr.io/org/app:1");
        assert_eq!(args[0], "verify-attestation");
        assert_eq!(args.len(), 8);
    }

    #[tokio::test]
    async fn missing_cosign_is_attestation_error() {
        let now = Utc::now();
        let st = InTotoStatement::from_sarif(SARIF, invocation(), now, now).unwrap();
        let attestor = CosignAttestor::new("/nonexistent/rumble-test-cosign", None);
        let err = attestor.attest("alpine:3.19", &st).await.unwrap_err();
        assert!(matches!(err, ScannerError::Attestation(_)));
    }
}
