//! 이미지 스캐너 에러 타입
//!
//! [`ScannerError`]는 스캔 실행, 리포트 정규화, 저장 행 코덱에서 발생할 수 있는
//! 모든 에러를 나타냅니다. `From<ScannerError> for RumbleError` 구현을 통해
//! `?` 연산자로 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **리포트**: `MalformedReport`, `DigestMissing` (현재 스캔 전체 실패)
//! - **저장 행**: `StoredRowDecode` (해당 행만 실패, 배치는 계속)
//! - **외부 프로세스**: `Process`, `Attestation`
//! - **저장소**: `Store`
//! - **설정 / 파일 I/O**: `Config`, `Io`
//!
//! 인식하지 못한 심각도 문자열은 에러가 아니라 경고 로그로만 남습니다.

use rumble_core::error::{ConfigError, RumbleError, ScanError, StorageError};

/// 이미지 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 스캐너 출력이 JSON이 아니거나 필수 구조가 없음
    #[error("malformed {scanner} report: {reason}")]
    MalformedReport {
        /// 스캐너 이름 (trivy, grype, sarif 등)
        scanner: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 스캐너가 repo digest를 보고하지 않음
    #[error("{scanner} report for '{image}' has no repository digest")]
    DigestMissing {
        /// 스캐너 이름
        scanner: String,
        /// 스캔 대상 이미지
        image: String,
    },

    /// 저장된 행의 원본 리포트 재파싱 실패
    #[error("failed to decode stored row '{row_id}' ({image}): {reason}")]
    StoredRowDecode {
        /// 행 ID
        row_id: String,
        /// 행의 이미지
        image: String,
        /// 실패 사유
        reason: String,
    },

    /// 외부 프로세스 실행 실패
    #[error("process '{program}' failed: {reason}")]
    Process {
        /// 실행 파일
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// attestation 생성 실패
    #[error("attestation error: {0}")]
    Attestation(String),

    /// 저장소 에러
    #[error("store error: {table}: {reason}")]
    Store {
        /// 대상 테이블
        table: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl ScannerError {
    /// 리포트 파싱 실패 에러를 생성합니다.
    pub fn malformed(scanner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReport {
            scanner: scanner.into(),
            reason: reason.into(),
        }
    }

    /// 파일 I/O 에러를 생성합니다.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<ScannerError> for RumbleError {
    fn from(err: ScannerError) -> Self {
        match err {
            e @ ScannerError::MalformedReport { .. } => {
                RumbleError::Scan(ScanError::MalformedReport(e.to_string()))
            }
            e @ ScannerError::DigestMissing { .. } => {
                RumbleError::Scan(ScanError::DigestMissing(e.to_string()))
            }
            e @ ScannerError::StoredRowDecode { .. } => {
                RumbleError::Storage(StorageError::RowDecode(e.to_string()))
            }
            e @ ScannerError::Process { .. } => RumbleError::Scan(ScanError::Process(e.to_string())),
            ScannerError::Attestation(msg) => RumbleError::Scan(ScanError::Attestation(msg)),
            e @ ScannerError::Store { .. } => RumbleError::Storage(StorageError::Insert(e.to_string())),
            ScannerError::Config { field, reason } => {
                RumbleError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScannerError::Io { source, .. } => RumbleError::Io(source),
        }
    }
}
