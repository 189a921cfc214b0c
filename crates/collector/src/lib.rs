//! # logcollect-collector
//!
//! UDP syslog 데이터그램을 받아 시간 단위 SQLite 버킷에 저장하고,
//! 보존 기간이 지난 버킷을 압축하는 수집 파이프라인입니다.
//!
//! # 모듈 구성
//!
//! - [`listener`]: UDP 소켓 수신, 데이터그램당 레코드 생성
//! - [`queue`]: 리스너와 워커 사이의 유한 FIFO (가득 차면 드롭)
//! - [`worker`]: 큐를 비우며 활성 버킷에 INSERT
//! - [`rotation`]: 로컬 시각 기준 시간 단위 버킷 전환
//! - [`bucket`]: 버킷 파일 이름 규칙과 SQLite 저장소
//! - [`archive`]: 보존 기간이 지난 버킷의 zstd 압축
//! - [`pipeline`]: 전체 생명주기 관리 (start/stop, 종료 시 드레인)
//! - [`config`]: 수집기 설정 (core 설정에서 파생)
//! - [`clock`]: 시계 추상화
//! - [`stats`]: 공유 카운터와 메트릭
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Listener -> IngestQueue -> PersistenceWorker -> RotationPolicy -> <dir>/YYYYMMDDHH.sqlite3
//!                                                                          |
//!                                              ArchivalSweep (주기 실행) -> .sqlite3.zst
//! ```
//!
//! 전달 보장은 at-most-once입니다. 데이터그램 손실, 큐 포화, INSERT 실패는
//! 모두 로그를 남기고 레코드를 버립니다.

pub mod archive;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod listener;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod rotation;
pub mod stats;
pub mod worker;

// --- 주요 타입 re-export ---

// 수집기
pub use pipeline::{LogCollector, LogCollectorBuilder};

// 설정
pub use config::{CollectorConfig, CollectorConfigBuilder};

// 에러
pub use error::CollectorError;

// 구성 요소
pub use archive::{ArchivalSweep, SweepReport};
pub use bucket::{BucketKey, BucketWriter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use listener::{Listener, running_privileged};
pub use queue::{IngestReceiver, IngestSender, Popped, ingest_queue};
pub use record::LogRecord;
pub use rotation::{Rotation, RotationPolicy};
pub use stats::{CollectorStats, StatsSnapshot};
pub use worker::PersistenceWorker;
