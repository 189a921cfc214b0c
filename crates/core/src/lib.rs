//! logcollect 공통 크레이트
//!
//! 수집기와 데몬이 함께 사용하는 에러 타입, 설정, 메트릭 이름을 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `logcollect.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 최상위 에러 타입
//! - [`metrics`]: 메트릭 이름 상수 및 설명 등록

pub mod config;
pub mod error;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogcollectError};

// 설정
pub use config::{
    ArchiveConfig, GeneralConfig, ListenerConfig, LogcollectConfig, MetricsConfig, StorageConfig,
};
