//! 수집기 에러 타입
//!
//! [`CollectorError`]는 수신, 큐, 버킷 저장, 아카이브 과정에서 발생하는
//! 모든 에러를 표현합니다. `From<CollectorError> for LogcollectError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use logcollect_core::error::LogcollectError;

/// 수집기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// UDP 소켓 생성 또는 바인드 실패 (치명적)
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// 바인드하려던 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 디렉토리가 존재하지 않음 (치명적)
    #[error("storage directory does not exist: {path}")]
    StorageDirMissing {
        /// 디렉토리 경로
        path: String,
    },

    /// 버킷 파일 열기/생성 실패
    #[error("failed to open bucket {path}: {reason}")]
    BucketOpen {
        /// 버킷 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 레코드 INSERT 실패
    #[error("insert failed: {0}")]
    Insert(String),

    /// 활성 버킷 없음 (회전 실패 이후)
    #[error("no bucket is open for writing")]
    NoActiveBucket,

    /// 버킷 압축 실패
    #[error("archive failed for {path}: {reason}")]
    Archive {
        /// 대상 버킷 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 이미 실행 중
    #[error("collector is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("collector is not running")]
    NotRunning,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite 에러
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<CollectorError> for LogcollectError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::Io(e) => LogcollectError::Io(e),
            other => LogcollectError::Collector(other.to_string()),
        }
    }
}
