//! trivy JSON 리포트 (`trivy image -f json`) 및 버전 문서 (`trivy --version -f json`)

use serde::{Deserialize, Serialize};

use super::{NackAnnotation, ScannerVersion, null_as_empty};
use crate::error::ScannerError;
use crate::types::{Suppression, VulnerabilityRecord};

/// trivy 리포트 최상위 구조
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrivyReport {
    #[serde(default)]
    pub artifact_name: String,
    pub metadata: TrivyMetadata,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub results: Vec<TrivyResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrivyMetadata {
    #[serde(rename = "ImageID", default)]
    pub image_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repo_digests: Vec<String>,
}

/// 대상(OS 패키지, 언어 lockfile 등)별 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrivyResult {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub class: String,
    #[serde(rename = "Type", default)]
    pub result_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    pub vulnerability_id: String,
    #[serde(default)]
    pub pkg_name: String,
    #[serde(default)]
    pub installed_version: String,
    #[serde(default)]
    pub fixed_version: String,
    #[serde(default)]
    pub severity: String,
    #[serde(rename = "PrimaryURL", default)]
    pub primary_url: String,
    #[serde(default, alias = "nack", skip_serializing_if = "Option::is_none")]
    pub nack: Option<NackAnnotation>,
}

impl TrivyReport {
    fn vulnerabilities(&self) -> impl Iterator<Item = (&TrivyResult, &TrivyVulnerability)> {
        self.results
            .iter()
            .flat_map(|r| r.vulnerabilities.iter().map(move |v| (r, v)))
    }

    /// 모든 결과에 걸친 취약점의 심각도 문자열
    pub fn severities(&self) -> impl Iterator<Item = &str> {
        self.vulnerabilities().map(|(_, v)| v.severity.as_str())
    }

    /// 취약점을 레코드로 변환합니다. `artifact_type`은 결과의 `Type`입니다.
    pub fn records(&self, scan_id: &str) -> Vec<VulnerabilityRecord> {
        self.vulnerabilities()
            .map(|(result, v)| VulnerabilityRecord {
                scan_id: scan_id.to_owned(),
                cve_id: v.vulnerability_id.clone(),
                data_source: v.primary_url.clone(),
                severity: v.severity.clone(),
                package_name: v.pkg_name.clone(),
                installed_version: v.installed_version.clone(),
                fixed_in_version: v.fixed_version.clone(),
                artifact_type: result.result_type.clone(),
                suppression: v.nack.as_ref().map(Suppression::from),
            })
            .collect()
    }
}

/// `trivy --version -f json` 출력
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrivyVersion {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "VulnerabilityDB", default)]
    pub vulnerability_db: Option<TrivyDbInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrivyDbInfo {
    #[serde(default)]
    pub updated_at: String,
}

impl TrivyVersion {
    /// 버전 문서를 파싱합니다.
    pub fn parse(bytes: &[u8]) -> Result<Self, ScannerError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ScannerError::malformed("trivy version", e.to_string()))
    }
}

impl From<TrivyVersion> for ScannerVersion {
    fn from(v: TrivyVersion) -> Self {
        Self {
            version: v.version,
            db_version: v.vulnerability_db.map(|db| db.updated_at).unwrap_or_default(),
        }
    }
}
