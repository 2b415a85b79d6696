//! 에러 타입: 도메인별 에러 정의

/// rumble 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RumbleError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 / 정규화 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 스캐너 리포트 파싱 실패
    #[error("malformed report: {0}")]
    MalformedReport(String),

    /// 리포트에 repo digest 없음
    #[error("digest missing: {0}")]
    DigestMissing(String),

    /// 외부 프로세스 실행 실패 (scanner, cosign)
    #[error("process failed: {0}")]
    Process(String),

    /// attestation 생성/서명 실패
    #[error("attestation failed: {0}")]
    Attestation(String),
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 행 추가 실패
    #[error("insert failed: {0}")]
    Insert(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 저장된 행 디코딩 실패
    #[error("row decode failed: {0}")]
    RowDecode(String),
}
