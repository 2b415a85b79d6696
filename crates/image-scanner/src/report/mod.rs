//! 스캐너 리포트 파서
//!
//! 스캐너별 네이티브 JSON 리포트를 내부 구조로 디코딩합니다.
//! 구조적 디코딩만 수행하며, 심각도 문자열의 유효성은 정규화 단계에서 판단합니다.
//!
//! - [`grype`]: `grype -o json`
//! - [`trivy`]: `trivy image -f json`, `trivy --version -f json`

pub mod grype;
pub mod trivy;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScannerError;
use crate::types::{ScannerKind, Suppression, VulnerabilityRecord};

pub use grype::GrypeReport;
pub use trivy::{TrivyReport, TrivyVersion};

/// 스캐너 버전 정보
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannerVersion {
    pub version: String,
    /// 취약점 DB 식별자
    pub db_version: String,
}

/// 스캐너별 리포트 본문
#[derive(Debug, Clone)]
pub enum ReportBody {
    Grype(GrypeReport),
    Trivy(TrivyReport),
}

impl ReportBody {
    /// 원본 바이트를 지정한 스캐너의 스키마로 디코딩합니다.
    pub fn parse(kind: ScannerKind, bytes: &[u8]) -> Result<Self, ScannerError> {
        let malformed = |e: serde_json::Error| ScannerError::malformed(kind.as_str(), e.to_string());
        match kind {
            ScannerKind::Grype => serde_json::from_slice(bytes).map(Self::Grype).map_err(malformed),
            ScannerKind::Trivy => serde_json::from_slice(bytes).map(Self::Trivy).map_err(malformed),
        }
    }

    pub fn kind(&self) -> ScannerKind {
        match self {
            Self::Grype(_) => ScannerKind::Grype,
            Self::Trivy(_) => ScannerKind::Trivy,
        }
    }

    /// 스캐너가 보고한 repo digest 목록
    pub fn repo_digests(&self) -> &[String] {
        match self {
            Self::Grype(r) => &r.source.target.repo_digests,
            Self::Trivy(r) => &r.metadata.repo_digests,
        }
    }

    /// 매치마다 하나씩, 원본 심각도 문자열
    pub fn severities(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Grype(r) => Box::new(r.severities()),
            Self::Trivy(r) => Box::new(r.severities()),
        }
    }

    /// 매치 목록을 취약점 레코드로 변환합니다.
    pub fn records(&self, scan_id: &str) -> Vec<VulnerabilityRecord> {
        match self {
            Self::Grype(r) => r.records(scan_id),
            Self::Trivy(r) => r.records(scan_id),
        }
    }
}

/// 파싱된 스캔 리포트
///
/// 디코딩된 본문, 스캐너 버전, 압축된 원본 JSON을 함께 보관합니다.
/// grype는 리포트 안의 `descriptor`에서 버전을 얻고, trivy는 별도의 버전
/// 조회 결과를 [`ScanReport::with_version`]으로 붙입니다.
#[derive(Debug, Clone)]
pub struct ScanReport {
    body: ReportBody,
    version: ScannerVersion,
    raw_json: String,
}

impl ScanReport {
    /// 원본 리포트 바이트를 파싱합니다.
    ///
    /// # Errors
    ///
    /// JSON이 아니거나 필수 최상위 구조가 없으면 `MalformedReport`를 반환합니다.
    pub fn parse(kind: ScannerKind, bytes: &[u8]) -> Result<Self, ScannerError> {
        let body = ReportBody::parse(kind, bytes)?;
        let raw_json = compact_json(kind.as_str(), bytes)?;
        let version = match &body {
            ReportBody::Grype(r) => ScannerVersion {
                version: r.descriptor.version.clone(),
                db_version: r.descriptor.db.checksum.clone(),
            },
            ReportBody::Trivy(_) => ScannerVersion::default(),
        };

        tracing::debug!(
            scanner = %kind,
            bytes = bytes.len(),
            compacted = raw_json.len(),
            "parsed scan report"
        );

        Ok(Self {
            body,
            version,
            raw_json,
        })
    }

    /// 스캐너 버전 정보를 교체합니다.
    pub fn with_version(mut self, version: ScannerVersion) -> Self {
        self.version = version;
        self
    }

    pub fn kind(&self) -> ScannerKind {
        self.body.kind()
    }

    pub fn body(&self) -> &ReportBody {
        &self.body
    }

    pub fn version(&self) -> &ScannerVersion {
        &self.version
    }

    /// 압축된 원본 JSON
    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }
}

/// 외부 억제 도구가 매치에 붙이는 주석
///
/// 대소문자가 다른 키(`url`/`Url`, `reason`/`Reason`)를 모두 받습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NackAnnotation {
    #[serde(default, alias = "Url", alias = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "Cve", alias = "CVE")]
    pub cve: String,
    #[serde(default, alias = "Reason")]
    pub reason: String,
}

impl From<&NackAnnotation> for Suppression {
    fn from(nack: &NackAnnotation) -> Self {
        Self {
            url: nack.url.clone(),
            reason: nack.reason.clone(),
        }
    }
}

/// `null` 목록을 빈 `Vec`으로 디코딩합니다.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// JSON 문서에서 문자열 밖의 공백을 제거합니다.
///
/// 키 순서와 숫자 표기를 그대로 유지하기 위해 값을 재직렬화하지 않습니다.
/// 입력이 유효한 JSON이 아니면 `MalformedReport`를 반환합니다.
pub fn compact_json(scanner: &str, bytes: &[u8]) -> Result<String, ScannerError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ScannerError::malformed(scanner, format!("report is not UTF-8: {e}")))?;
    serde_json::from_str::<serde::de::IgnoredAny>(text)
        .map_err(|e| ScannerError::malformed(scanner, e.to_string()))?;

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if !matches!(c, ' ' | '\t' | '\n' | '\r') {
            out.push(c);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_strips_whitespace_outside_strings() {
        let input = b"{\n  \"a\" : [1, 2],\n  \"b\": \"x y\\\" z\"\n}";
        let out = compact_json("grype", input).unwrap();
        assert_eq!(out, r#"{"a":[1,2],"b":"x y\" z"}"#);
    }

    #[test]
    fn compact_preserves_key_order() {
        let out = compact_json("grype", br#"{ "z": 1, "a": 2 }"#).unwrap();
        assert_eq!(out, r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn compact_rejects_invalid_json() {
        let err = compact_json("trivy", b"{\"a\": ").unwrap_err();
        assert!(matches!(err, ScannerError::MalformedReport { .. }));
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = ScanReport::parse(ScannerKind::Grype, b"not json").unwrap_err();
        assert!(err.to_string().contains("grype"));
    }

    #[test]
    fn parse_rejects_wrong_dialect() {
        let grype = br#"{"matches": [], "source": {"target": {"repoDigests": []}}, "descriptor": {}}"#;
        assert!(ScanReport::parse(ScannerKind::Grype, grype).is_ok());
        assert!(ScanReport::parse(ScannerKind::Trivy, grype).is_err());
    }

    #[test]
    fn grype_version_comes_from_descriptor() {
        let grype = br#"{"matches": [], "source": {"target": {"repoDigests": []}},
            "descriptor": {"version": "0.74.0", "db": {"checksum": "sha256:abc"}}}"#;
        let report = ScanReport::parse(ScannerKind::Grype, grype).unwrap();
        assert_eq!(report.version().version, "0.74.0");
        assert_eq!(report.version().db_version, "sha256:abc");
    }

    #[test]
    fn trivy_version_is_attached() {
        let trivy = br#"{"Metadata": {"RepoDigests": []}}"#;
        let report = ScanReport::parse(ScannerKind::Trivy, trivy)
            .unwrap()
            .with_version(ScannerVersion {
                version: "0.48.3".to_owned(),
                db_version: "2024-01-30T12:11:25Z".to_owned(),
            });
        assert_eq!(report.kind(), ScannerKind::Trivy);
        assert_eq!(report.version().version, "0.48.3");
    }

    #[test]
    fn nack_accepts_lowercase_keys() {
        let nack: NackAnnotation =
            serde_json::from_str(r#"{"url": null, "cve": "CVE-1", "reason": "vendor says no"}"#).unwrap();
        let sup = Suppression::from(&nack);
        assert!(sup.url.is_none());
        assert_eq!(sup.reason, "vendor says no");
    }
}
