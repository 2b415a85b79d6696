//! 이미지 스캐너 설정
//!
//! [`ScannerConfig`]는 core의 [`RumbleConfig`](rumble_core::config::RumbleConfig)
//! `[scan]` 섹션에서 스캐너 실행에 필요한 값만 꺼내 타입이 있는 형태로 보관합니다.
//!
//! # 사용 예시
//!
//! ```
//! use rumble_scanner::{ScannerConfigBuilder, ScannerKind};
//!
//! let config = ScannerConfigBuilder::new()
//!     .scanner(ScannerKind::Trivy)
//!     .trivy_timeout("30m")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.trivy_timeout, "30m");
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ScannerError;
use crate::types::ScannerKind;

/// 스캐너 실행 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// 기본 스캐너
    pub scanner: ScannerKind,
    pub trivy_binary: String,
    pub grype_binary: String,
    pub cosign_binary: String,
    /// trivy `--timeout` 값 (Go duration 형식, 예: `15m`)
    pub trivy_timeout: String,
    /// 자식 프로세스에 `DOCKER_CONFIG`로 전달할 디렉토리
    pub docker_config: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerKind::Grype,
            trivy_binary: "trivy".to_owned(),
            grype_binary: "grype".to_owned(),
            cosign_binary: "cosign".to_owned(),
            trivy_timeout: "15m".to_owned(),
            docker_config: None,
        }
    }
}

impl ScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    ///
    /// 알 수 없는 스캐너 이름은 grype로 대체합니다 (core 검증에서 이미 걸러짐).
    pub fn from_core(core: &rumble_core::config::RumbleConfig) -> Self {
        let scan = &core.scan;
        Self {
            scanner: ScannerKind::from_str_loose(&scan.scanner).unwrap_or(ScannerKind::Grype),
            trivy_binary: scan.trivy_binary.clone(),
            grype_binary: scan.grype_binary.clone(),
            cosign_binary: scan.cosign_binary.clone(),
            trivy_timeout: scan.trivy_timeout.clone(),
            docker_config: (!scan.docker_config.is_empty())
                .then(|| PathBuf::from(&scan.docker_config)),
        }
    }

    /// 스캐너 종류에 해당하는 실행 파일
    pub fn binary_for(&self, kind: ScannerKind) -> &str {
        match kind {
            ScannerKind::Trivy => &self.trivy_binary,
            ScannerKind::Grype => &self.grype_binary,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - 실행 파일 이름은 비어 있으면 안 됨
    /// - `trivy_timeout`: 숫자로 시작하고 `s`, `m`, `h` 중 하나로 끝남
    pub fn validate(&self) -> Result<(), ScannerError> {
        for (field, value) in [
            ("trivy_binary", &self.trivy_binary),
            ("grype_binary", &self.grype_binary),
            ("cosign_binary", &self.cosign_binary),
        ] {
            if value.trim().is_empty() {
                return Err(ScannerError::Config {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                });
            }
        }

        if !is_go_duration(&self.trivy_timeout) {
            return Err(ScannerError::Config {
                field: "trivy_timeout".to_owned(),
                reason: format!("'{}' is not a duration like 15m or 1h30m", self.trivy_timeout),
            });
        }

        Ok(())
    }
}

fn is_go_duration(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit())
        && s.ends_with(['s', 'm', 'h'])
        && s.chars().all(|c| c.is_ascii_digit() || matches!(c, 's' | 'm' | 'h' | '.'))
}

/// [`ScannerConfig`] 빌더
#[derive(Default)]
pub struct ScannerConfigBuilder {
    config: ScannerConfig,
}

impl ScannerConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scanner(mut self, kind: ScannerKind) -> Self {
        self.config.scanner = kind;
        self
    }

    pub fn trivy_binary(mut self, path: impl Into<String>) -> Self {
        self.config.trivy_binary = path.into();
        self
    }

    pub fn grype_binary(mut self, path: impl Into<String>) -> Self {
        self.config.grype_binary = path.into();
        self
    }

    pub fn cosign_binary(mut self, path: impl Into<String>) -> Self {
        self.config.cosign_binary = path.into();
        self
    }

    pub fn trivy_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.config.trivy_timeout = timeout.into();
        self
    }

    /// `DOCKER_CONFIG` 디렉토리를 설정합니다.
    pub fn docker_config(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.docker_config = Some(dir.into());
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScannerError::Config` 반환
    pub fn build(self) -> Result<ScannerConfig, ScannerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
