//! 설정 관리 -- logcollect.toml 파싱 및 런타임 설정
//!
//! [`LogcollectConfig`]는 수집기와 데몬의 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGCOLLECT_LISTENER_PORT=5140` 형식)
//! 3. 설정 파일 (`logcollect.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logcollect_core::error::LogcollectError> {
//! use logcollect_core::config::LogcollectConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogcollectConfig::load("logcollect.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogcollectConfig::parse("[storage]\ndir = \"/var/lib/logcollect\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogcollectError};

/// 권한 있는 프로세스의 기본 syslog 포트
pub const PRIVILEGED_PORT: u16 = 514;

/// 일반 사용자 프로세스의 기본 포트
pub const UNPRIVILEGED_PORT: u16 = 5140;

/// logcollect 통합 설정
///
/// `logcollect.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogcollectConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// UDP 수신기 및 인제스트 큐 설정
    #[serde(default)]
    pub listener: ListenerConfig,
    /// 버킷 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 아카이브 스윕 설정
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogcollectConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogcollectError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogcollectError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogcollectError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogcollectError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogcollectError> {
        toml::from_str(toml_str).map_err(|e| {
            LogcollectError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGCOLLECT_{SECTION}_{FIELD}`
    /// 예: `LOGCOLLECT_STORAGE_DIR=/var/lib/logcollect`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGCOLLECT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGCOLLECT_GENERAL_LOG_FORMAT");

        // Listener
        override_string(&mut self.listener.bind_ip, "LOGCOLLECT_LISTENER_BIND_IP");
        override_u16(&mut self.listener.port, "LOGCOLLECT_LISTENER_PORT");
        override_usize(
            &mut self.listener.recv_buffer_size,
            "LOGCOLLECT_LISTENER_RECV_BUFFER_SIZE",
        );
        override_usize(
            &mut self.listener.max_message_size,
            "LOGCOLLECT_LISTENER_MAX_MESSAGE_SIZE",
        );
        override_usize(
            &mut self.listener.queue_capacity,
            "LOGCOLLECT_LISTENER_QUEUE_CAPACITY",
        );

        // Storage
        override_string(&mut self.storage.dir, "LOGCOLLECT_STORAGE_DIR");

        // Archive
        override_bool(&mut self.archive.enabled, "LOGCOLLECT_ARCHIVE_ENABLED");
        override_u64(
            &mut self.archive.retention_secs,
            "LOGCOLLECT_ARCHIVE_RETENTION_SECS",
        );
        override_u64(
            &mut self.archive.sweep_interval_secs,
            "LOGCOLLECT_ARCHIVE_SWEEP_INTERVAL_SECS",
        );
        override_i32(
            &mut self.archive.compression_level,
            "LOGCOLLECT_ARCHIVE_COMPRESSION_LEVEL",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGCOLLECT_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGCOLLECT_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGCOLLECT_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogcollectError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.listener.bind_ip.parse::<std::net::Ipv4Addr>().is_err() {
            return Err(invalid(
                "listener.bind_ip",
                format!("'{}' is not an IPv4 address", self.listener.bind_ip),
            ));
        }

        if self.listener.max_message_size == 0 || self.listener.max_message_size > 65535 {
            return Err(invalid("listener.max_message_size", "must be 1-65535"));
        }

        if self.listener.queue_capacity == 0 {
            return Err(invalid("listener.queue_capacity", "must be greater than 0"));
        }

        if self.storage.dir.is_empty() {
            return Err(invalid("storage.dir", "must not be empty"));
        }

        if self.archive.enabled {
            if self.archive.sweep_interval_secs == 0 {
                return Err(invalid(
                    "archive.sweep_interval_secs",
                    "must be greater than 0",
                ));
            }
            if !(1..=22).contains(&self.archive.compression_level) {
                return Err(invalid("archive.compression_level", "must be 1-22"));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be set when metrics are enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LogcollectError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
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

/// UDP 수신기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// 바인드 IPv4 주소 (기본: 모든 인터페이스)
    pub bind_ip: String,
    /// 수신 포트. 0이면 실행 권한에 따라 514 또는 5140
    pub port: u16,
    /// 요청할 소켓 수신 버퍼 크기 (바이트)
    pub recv_buffer_size: usize,
    /// 데이터그램 최대 크기 (바이트)
    pub max_message_size: usize,
    /// 인제스트 큐 최대 용량
    pub queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".to_owned(),
            port: 0,
            recv_buffer_size: 256 * 1024, // 256KB
            max_message_size: 65535,
            queue_capacity: 100_000,
        }
    }
}

impl ListenerConfig {
    /// 실제로 바인드할 포트를 결정합니다.
    ///
    /// 포트가 명시되지 않았으면(0) 권한 있는 프로세스는 514,
    /// 그 외에는 5140을 사용합니다.
    pub fn resolve_port(&self, privileged: bool) -> u16 {
        match self.port {
            0 if privileged => PRIVILEGED_PORT,
            0 => UNPRIVILEGED_PORT,
            port => port,
        }
    }
}

/// 버킷 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 시간 단위 버킷 파일이 생성되는 디렉토리 (미리 존재해야 함)
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: "./db".to_owned(),
        }
    }
}

/// 아카이브 스윕 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 이 나이(초) 이상인 버킷을 압축
    pub retention_secs: u64,
    /// 스윕 주기 (초)
    pub sweep_interval_secs: u64,
    /// zstd 압축 레벨 (1-22)
    pub compression_level: i32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_secs: 7 * 86_400,
            sweep_interval_secs: 3600,
            compression_level: 3,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// HTTP 리스너 주소
    pub listen_addr: String,
    /// HTTP 리스너 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9105,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_i32(target: &mut i32, env_key: &str) {
    override_parsed(target, env_key, "i32");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}
