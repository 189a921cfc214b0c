//! 수집기 설정
//!
//! [`CollectorConfig`]는 core의 [`LogcollectConfig`]에서 수집기 런타임에 필요한
//! 값만 골라 해석된 형태(`SocketAddr`, `PathBuf`, `Duration`)로 보관합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logcollect_core::config::LogcollectConfig;
//! use logcollect_collector::config::CollectorConfig;
//!
//! let core_config = LogcollectConfig::default();
//! let config = CollectorConfig::from_core(&core_config, false)?;
//! assert_eq!(config.bind_addr.port(), 5140);
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use logcollect_core::config::LogcollectConfig;
use serde::{Deserialize, Serialize};

use crate::archive::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL};
use crate::error::CollectorError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// UDP 데이터그램 최대 크기
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// 수집기 런타임 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// UDP 바인드 주소
    pub bind_addr: SocketAddr,
    /// 요청할 소켓 수신 버퍼 크기 (0이면 OS 기본값 유지)
    pub recv_buffer_size: usize,
    /// 수신 버퍼 크기 (이보다 긴 데이터그램은 잘림)
    pub max_message_size: usize,
    /// 인제스트 큐 용량
    pub queue_capacity: usize,
    /// 버킷 디렉토리 (미리 존재해야 함)
    pub storage_dir: PathBuf,
    /// 아카이브 스윕 실행 여부
    pub archive_enabled: bool,
    /// 버킷 보존 기간
    pub retention: Duration,
    /// 스윕 주기
    pub sweep_interval: Duration,
    /// zstd 압축 레벨
    pub compression_level: i32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                logcollect_core::config::UNPRIVILEGED_PORT,
            ),
            recv_buffer_size: 256 * 1024,
            max_message_size: MAX_DATAGRAM_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            storage_dir: PathBuf::from("./db"),
            archive_enabled: true,
            retention: DEFAULT_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl CollectorConfig {
    /// core 설정에서 수집기 설정을 생성합니다.
    ///
    /// `privileged`는 포트가 지정되지 않았을 때 514와 5140 중 무엇을 쓸지 결정합니다.
    pub fn from_core(core: &LogcollectConfig, privileged: bool) -> Result<Self, CollectorError> {
        let ip: Ipv4Addr = core.listener.bind_ip.parse().map_err(|_| CollectorError::Config {
            field: "listener.bind_ip".to_owned(),
            reason: format!("'{}' is not an IPv4 address", core.listener.bind_ip),
        })?;

        let config = Self {
            bind_addr: SocketAddr::new(IpAddr::V4(ip), core.listener.resolve_port(privileged)),
            recv_buffer_size: core.listener.recv_buffer_size,
            max_message_size: core.listener.max_message_size,
            queue_capacity: core.listener.queue_capacity,
            storage_dir: PathBuf::from(&core.storage.dir),
            archive_enabled: core.archive.enabled,
            retention: Duration::from_secs(core.archive.retention_secs),
            sweep_interval: Duration::from_secs(core.archive.sweep_interval_secs),
            compression_level: core.archive.compression_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.max_message_size == 0 || self.max_message_size > MAX_DATAGRAM_SIZE {
            return Err(config_err(
                "max_message_size",
                format!("must be 1-{MAX_DATAGRAM_SIZE}"),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(config_err("queue_capacity", "must be greater than 0"));
        }

        if self.storage_dir.as_os_str().is_empty() {
            return Err(config_err("storage_dir", "must not be empty"));
        }

        if self.archive_enabled {
            if self.sweep_interval.is_zero() {
                return Err(config_err("sweep_interval", "must be greater than 0"));
            }
            if !(1..=22).contains(&self.compression_level) {
                return Err(config_err("compression_level", "must be 1-22"));
            }
        }

        Ok(())
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> CollectorError {
    CollectorError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 수집기 설정 빌더
#[derive(Default)]
pub struct CollectorConfigBuilder {
    config: CollectorConfig,
}

impl CollectorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// UDP 바인드 주소를 설정합니다.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// 소켓 수신 버퍼 크기를 설정합니다.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// 최대 메시지 크기를 설정합니다.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 버킷 디렉토리를 설정합니다.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    /// 아카이브 스윕 실행 여부를 설정합니다.
    pub fn archive_enabled(mut self, enabled: bool) -> Self {
        self.config.archive_enabled = enabled;
        self
    }

    /// 보존 기간을 설정합니다.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    /// 스윕 주기를 설정합니다.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// 압축 레벨을 설정합니다.
    pub fn compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    pub fn build(self) -> Result<CollectorConfig, CollectorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
