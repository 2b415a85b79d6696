//! 도메인 타입 -- 이미지 스캔 요약과 취약점 레코드
//!
//! 두 스캐너(trivy, grype)의 서로 다른 리포트를 하나의 [`ScanSummary`]와
//! [`VulnerabilityRecord`] 목록으로 표현합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 지원하는 스캐너 종류
///
/// 스캐너마다 심각도 문자열 표기가 다르므로 [`ScannerKind::classify`]가
/// 스캐너별 매핑 테이블을 가집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// aquasecurity/trivy
    Trivy,
    /// anchore/grype
    Grype,
}

impl fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScannerKind {
    /// 저장 행과 CLI에서 쓰는 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trivy => "trivy",
            Self::Grype => "grype",
        }
    }

    /// 문자열에서 스캐너 종류를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trivy" => Some(Self::Trivy),
            "grype" => Some(Self::Grype),
            _ => None,
        }
    }

    /// 스캐너가 보고한 심각도 문자열을 버킷으로 분류합니다.
    ///
    /// 대소문자를 구분합니다. grype는 `High`, trivy는 `HIGH` 형태만 인식하며,
    /// 테이블에 없는 문자열은 `None`을 반환합니다.
    pub fn classify(&self, severity: &str) -> Option<SeverityBucket> {
        match self {
            Self::Grype => match severity {
                "Low" => Some(SeverityBucket::Low),
                "Medium" => Some(SeverityBucket::Medium),
                "High" => Some(SeverityBucket::High),
                "Critical" => Some(SeverityBucket::Critical),
                "Negligible" => Some(SeverityBucket::Negligible),
                "Unknown" => Some(SeverityBucket::Unknown),
                _ => None,
            },
            // trivy에는 negligible 등급이 없음
            Self::Trivy => match severity {
                "LOW" => Some(SeverityBucket::Low),
                "MEDIUM" => Some(SeverityBucket::Medium),
                "HIGH" => Some(SeverityBucket::High),
                "CRITICAL" => Some(SeverityBucket::Critical),
                "UNKNOWN" => Some(SeverityBucket::Unknown),
                _ => None,
            },
        }
    }
}

/// 정규화된 심각도 버킷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeverityBucket {
    Low,
    Medium,
    High,
    Critical,
    Negligible,
    Unknown,
}

/// 심각도별 취약점 개수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
    pub negligible: u64,
    pub unknown: u64,
}

impl SeverityCounts {
    /// 버킷 하나를 증가시킵니다.
    pub fn record(&mut self, bucket: SeverityBucket) {
        match bucket {
            SeverityBucket::Low => self.low += 1,
            SeverityBucket::Medium => self.medium += 1,
            SeverityBucket::High => self.high += 1,
            SeverityBucket::Critical => self.critical += 1,
            SeverityBucket::Negligible => self.negligible += 1,
            SeverityBucket::Unknown => self.unknown += 1,
        }
    }

    /// 여섯 버킷의 합계를 반환합니다.
    ///
    /// 인식하지 못한 심각도는 어느 버킷에도 들어가지 않으므로
    /// [`ScanSummary::total`]보다 작을 수 있습니다.
    pub fn bucketed_total(&self) -> u64 {
        self.low + self.medium + self.high + self.critical + self.negligible + self.unknown
    }

    /// 최신 스캔 리포트에 표시되는 다섯 버킷(unknown 제외)의 합계를 반환합니다.
    pub fn reported_total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low + self.negligible
    }
}

/// 이미지 스캔 1회의 정규화된 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// 행 식별자 (업로드 직전 [`ScanSummary::assign_id`]로 부여)
    pub id: String,
    /// 스캔 대상 이미지 참조
    pub image: String,
    /// 저장소 이름을 제거한 content digest (예: `sha256:...`)
    pub digest: String,
    pub scanner: ScannerKind,
    pub scanner_version: String,
    /// 스캐너별 취약점 DB 식별자 (grype: checksum, trivy: UpdatedAt)
    pub scanner_db_version: String,
    /// 스캔 시작 시각 (UTC, 초 단위)
    pub time: DateTime<Utc>,
    /// 이미지 빌드 시각 (알 수 없으면 epoch)
    pub created: DateTime<Utc>,
    pub success: bool,
    pub counts: SeverityCounts,
    /// 원본 매치 목록의 항목 수
    pub total: u64,
    /// 압축(minify)된 원본 스캐너 리포트
    pub raw_report_json: String,
}

impl ScanSummary {
    /// 비어 있는 요약을 생성합니다.
    ///
    /// `time`은 초 단위로 절삭되고 `created`는 epoch로 초기화됩니다.
    pub fn new(image: impl Into<String>, scanner: ScannerKind, time: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            image: image.into(),
            digest: String::new(),
            scanner,
            scanner_version: String::new(),
            scanner_db_version: String::new(),
            time: truncate_to_seconds(time),
            created: DateTime::UNIX_EPOCH,
            success: false,
            counts: SeverityCounts::default(),
            total: 0,
            raw_report_json: String::new(),
        }
    }

    /// 아직 ID가 없으면 새 UUID를 부여하고 ID를 반환합니다.
    pub fn assign_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        &self.id
    }

    /// 이미지 빌드 시각을 설정합니다.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = truncate_to_seconds(created);
        self
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {} {}: {} vulnerabilities",
            self.image, self.digest, self.scanner, self.scanner_version, self.total
        )
    }
}

/// 초 미만 정밀도를 제거합니다.
pub fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

/// 운영자가 "해당 없음"으로 표시한 CVE 주석
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    /// 근거 문서 URL (없을 수 있음)
    pub url: Option<String>,
    /// 사유
    pub reason: String,
}

/// 스캐너 매치 하나에서 추출한 취약점 레코드
///
/// `severity`는 스캐너 원본 문자열 그대로이며 버킷으로 정규화하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// 소속 [`ScanSummary`]의 ID
    pub scan_id: String,
    pub cve_id: String,
    /// 권고(advisory) URL
    pub data_source: String,
    pub severity: String,
    pub package_name: String,
    pub installed_version: String,
    /// 수정 버전 (수정이 없으면 빈 문자열)
    pub fixed_in_version: String,
    /// 패키지 생태계 / 아티팩트 종류
    pub artifact_type: String,
    pub suppression: Option<Suppression>,
}

impl fmt::Display for VulnerabilityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}@{}",
            self.cve_id, self.severity, self.package_name, self.installed_version
        )?;
        if !self.fixed_in_version.is_empty() {
            write!(f, " (fixed in {})", self.fixed_in_version)?;
        }
        Ok(())
    }
}
