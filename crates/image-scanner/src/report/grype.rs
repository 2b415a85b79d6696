//! grype JSON 리포트 (`grype -o json`)
//!
//! `matches[]`, `source.target.repoDigests`, `descriptor.{version,db.checksum}`
//! 만 해석하고 나머지 필드는 무시합니다.

use serde::{Deserialize, Serialize};

use super::{NackAnnotation, null_as_empty};
use crate::types::{Suppression, VulnerabilityRecord};

/// grype 리포트 최상위 구조
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrypeReport {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub matches: Vec<GrypeMatch>,
    pub source: GrypeSource,
    pub descriptor: GrypeDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrypeSource {
    #[serde(rename = "type", default)]
    pub source_type: String,
    pub target: GrypeTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrypeTarget {
    #[serde(default)]
    pub user_input: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repo_digests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrypeDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub db: GrypeDb,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrypeDb {
    #[serde(default)]
    pub checksum: String,
}

/// 매치 하나 (취약점 + 영향받는 아티팩트)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrypeMatch {
    pub vulnerability: GrypeVulnerability,
    pub artifact: GrypeArtifact,
    /// 외부 억제 도구가 붙인 주석
    #[serde(default, alias = "Nack", skip_serializing_if = "Option::is_none")]
    pub nack: Option<NackAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrypeVulnerability {
    pub id: String,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub fix: GrypeFix,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrypeFix {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub versions: Vec<String>,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrypeArtifact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default)]
    pub artifact_type: String,
}

impl GrypeReport {
    /// 각 매치의 심각도 문자열
    pub fn severities(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.vulnerability.severity.as_str())
    }

    /// 매치를 취약점 레코드로 변환합니다.
    pub fn records(&self, scan_id: &str) -> Vec<VulnerabilityRecord> {
        self.matches
            .iter()
            .map(|m| VulnerabilityRecord {
                scan_id: scan_id.to_owned(),
                cve_id: m.vulnerability.id.clone(),
                data_source: m.vulnerability.data_source.clone(),
                severity: m.vulnerability.severity.clone(),
                package_name: m.artifact.name.clone(),
                installed_version: m.artifact.version.clone(),
                fixed_in_version: m.vulnerability.fix.versions.join(", "),
                artifact_type: m.artifact.artifact_type.clone(),
                suppression: m.nack.as_ref().map(Suppression::from),
            })
            .collect()
    }
}
