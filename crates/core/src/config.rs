//! 설정 관리: rumble.toml 파싱 및 런타임 설정
//!
//! [`RumbleConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RUMBLE_STORE_DATASET=vulns` 형식)
//! 3. 설정 파일 (`rumble.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 환경변수는 직접 읽지 않고 호출자가 주입한 조회 함수를 통해서만 적용됩니다.
//! 바이너리는 `|key| std::env::var(key).ok()`를 넘기고, 테스트는 맵을 넘깁니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), rumble_core::error::RumbleError> {
//! use rumble_core::config::RumbleConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RumbleConfig::load("rumble.toml", |key| std::env::var(key).ok()).await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RumbleConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RumbleError};

/// 지원하는 스캐너 이름
pub const VALID_SCANNERS: [&str; 2] = ["trivy", "grype"];

/// rumble 통합 설정
///
/// `rumble.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RumbleConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 실행 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 분석 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// attestation 설정
    #[serde(default)]
    pub attest: AttestConfig,
}

impl RumbleConfig {
    /// TOML 파일에서 설정을 로드하고 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. `lookup`을 통한 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, RumbleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::from_file(path).await?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RumbleError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RumbleError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RumbleError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RumbleError> {
        toml::from_str(toml_str).map_err(|e| {
            RumbleError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 주입된 조회 함수로 설정값을 오버라이드합니다.
    ///
    /// 키 네이밍 규칙: `RUMBLE_{SECTION}_{FIELD}`
    /// 예: `RUMBLE_STORE_DATASET=vulns`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // General
        override_string(&lookup, &mut self.general.log_level, "RUMBLE_GENERAL_LOG_LEVEL");
        override_string(&lookup, &mut self.general.log_format, "RUMBLE_GENERAL_LOG_FORMAT");

        // Scan
        override_string(&lookup, &mut self.scan.scanner, "RUMBLE_SCAN_SCANNER");
        override_string(&lookup, &mut self.scan.docker_config, "RUMBLE_SCAN_DOCKER_CONFIG");
        override_string(&lookup, &mut self.scan.trivy_timeout, "RUMBLE_SCAN_TRIVY_TIMEOUT");
        override_string(&lookup, &mut self.scan.trivy_binary, "RUMBLE_SCAN_TRIVY_BINARY");
        override_string(&lookup, &mut self.scan.grype_binary, "RUMBLE_SCAN_GRYPE_BINARY");
        override_string(&lookup, &mut self.scan.cosign_binary, "RUMBLE_SCAN_COSIGN_BINARY");

        // Store
        override_bool(&lookup, &mut self.store.enabled, "RUMBLE_STORE_ENABLED");
        override_string(&lookup, &mut self.store.root_dir, "RUMBLE_STORE_ROOT_DIR");
        override_string(&lookup, &mut self.store.project, "RUMBLE_STORE_PROJECT");
        override_string(&lookup, &mut self.store.dataset, "RUMBLE_STORE_DATASET");
        override_string(&lookup, &mut self.store.table, "RUMBLE_STORE_TABLE");
        override_string(&lookup, &mut self.store.vulns_table, "RUMBLE_STORE_VULNS_TABLE");

        // Attest
        override_string(
            &lookup,
            &mut self.attest.invocation_uri,
            "RUMBLE_ATTEST_INVOCATION_URI",
        );
        override_string(
            &lookup,
            &mut self.attest.invocation_event_id,
            "RUMBLE_ATTEST_INVOCATION_EVENT_ID",
        );
        override_string(
            &lookup,
            &mut self.attest.invocation_builder_id,
            "RUMBLE_ATTEST_INVOCATION_BUILDER_ID",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RumbleError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if !VALID_SCANNERS.contains(&self.scan.scanner.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "scan.scanner".to_owned(),
                reason: format!("must be one of: {}", VALID_SCANNERS.join(", ")),
            }
            .into());
        }

        // 저장소가 켜져 있으면 테이블 이름이 필요하다
        if self.store.enabled {
            for (field, value) in [
                ("store.dataset", &self.store.dataset),
                ("store.table", &self.store.table),
                ("store.vulns_table", &self.store.vulns_table),
            ] {
                if value.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_owned(),
                        reason: "must not be empty when store is enabled".to_owned(),
                    }
                    .into());
                }
                if value.contains('/') || value.contains("..") {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_owned(),
                        reason: "must be a plain name without path separators".to_owned(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 스캔 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 기본 스캐너 (trivy, grype)
    pub scanner: String,
    /// 외부 프로세스에 전달할 DOCKER_CONFIG 디렉토리 (빈 문자열이면 전달하지 않음)
    pub docker_config: String,
    /// trivy `--timeout` 값
    pub trivy_timeout: String,
    /// trivy 실행 파일
    pub trivy_binary: String,
    /// grype 실행 파일
    pub grype_binary: String,
    /// cosign 실행 파일
    pub cosign_binary: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scanner: "grype".to_owned(),
            docker_config: String::new(),
            trivy_timeout: "15m".to_owned(),
            trivy_binary: "trivy".to_owned(),
            grype_binary: "grype".to_owned(),
            cosign_binary: "cosign".to_owned(),
        }
    }
}

/// 분석 저장소 설정
///
/// 스캔 요약 테이블(`table`)과 취약점 테이블(`vulns_table`)은 같은 dataset에 속합니다.
/// 취약점 테이블의 `scan_id`는 요약 테이블의 `id`를 가리킵니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 업로드 활성화 여부
    pub enabled: bool,
    /// 저장소 루트 디렉토리
    pub root_dir: String,
    /// 프로젝트 식별자
    pub project: String,
    /// dataset 이름
    pub dataset: String,
    /// 스캔 요약 테이블
    pub table: String,
    /// 개별 취약점 테이블
    pub vulns_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root_dir: "/var/lib/rumble".to_owned(),
            project: String::new(),
            dataset: "rumble".to_owned(),
            table: "scans".to_owned(),
            vulns_table: "vulns".to_owned(),
        }
    }
}

/// attestation 설정 (in-toto invocation 값)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestConfig {
    /// invocation uri
    pub invocation_uri: String,
    /// invocation event_id
    pub invocation_event_id: String,
    /// invocation builder.id
    pub invocation_builder_id: String,
}

impl Default for AttestConfig {
    fn default() -> Self {
        Self {
            invocation_uri: "unknown".to_owned(),
            invocation_event_id: "unknown".to_owned(),
            invocation_builder_id: "unknown".to_owned(),
        }
    }
}

// --- 오버라이드 헬퍼 ---

fn override_string<F>(lookup: &F, target: &mut String, key: &str)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(key) {
        *target = val;
    }
}

fn override_bool<F>(lookup: &F, target: &mut bool, key: &str)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                key,
                value = val.as_str(),
                "failed to parse bool override, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = RumbleConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.scan.scanner, "grype");
        assert_eq!(config.scan.trivy_timeout, "15m");
        assert!(config.store.enabled);
        assert_eq!(config.attest.invocation_uri, "unknown");
    }

    #[test]
    fn default_config_passes_validation() {
        let config = RumbleConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = RumbleConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.store.table, "scans");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[store]
dataset = "images"
"#;
        let config = RumbleConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.store.dataset, "images");
        assert_eq!(config.store.vulns_table, "vulns");
    }

    #[test]
    fn from_str_invalid_toml_fails() {
        let err = RumbleConfig::parse("[general").unwrap_err();
        assert!(matches!(
            err,
            RumbleError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = RumbleConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn validate_rejects_unknown_scanner() {
        let mut config = RumbleConfig::default();
        config.scan.scanner = "clair".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scan.scanner"));
    }

    #[test]
    fn validate_rejects_empty_table_when_store_enabled() {
        let mut config = RumbleConfig::default();
        config.store.table = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.table"));
    }

    #[test]
    fn validate_allows_empty_table_when_store_disabled() {
        let mut config = RumbleConfig::default();
        config.store.enabled = false;
        config.store.table = String::new();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_path_like_dataset() {
        let mut config = RumbleConfig::default();
        config.store.dataset = "../etc".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let mut config = RumbleConfig::default();
        config.apply_overrides(lookup_from(&[
            ("RUMBLE_SCAN_SCANNER", "trivy"),
            ("RUMBLE_STORE_DATASET", "prod"),
            ("RUMBLE_STORE_ENABLED", "false"),
            ("RUMBLE_ATTEST_INVOCATION_URI", "https://ci.example/run/1"),
        ]));
        assert_eq!(config.scan.scanner, "trivy");
        assert_eq!(config.store.dataset, "prod");
        assert!(!config.store.enabled);
        assert_eq!(config.attest.invocation_uri, "https://ci.example/run/1");
    }

    #[test]
    fn invalid_bool_override_is_ignored() {
        let mut config = RumbleConfig::default();
        config.apply_overrides(lookup_from(&[("RUMBLE_STORE_ENABLED", "maybe")]));
        assert!(config.store.enabled);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = RumbleConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed = RumbleConfig::parse(&serialized).unwrap();
        assert_eq!(parsed.store.dataset, config.store.dataset);
        assert_eq!(parsed.scan.scanner, config.scan.scanner);
    }
}
