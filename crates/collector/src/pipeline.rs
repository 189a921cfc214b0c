//! 수집기 오케스트레이션 -- 리스너, 워커, 아카이브 스윕의 생명주기를 관리합니다.
//!
//! # 내부 아키텍처
//! ```text
//! Listener (task) -> IngestQueue -> PersistenceWorker (blocking thread) -> YYYYMMDDHH.sqlite3
//!                                          |
//!                                          +-- watch(active bucket) --> ArchivalSweep (task)
//! ```
//!
//! # 종료 순서
//! 1. 공유 `CancellationToken` 취소
//! 2. 리스너 종료 (더 이상 수신하지 않음)
//! 3. 워커가 큐를 닫고 남은 레코드를 활성 버킷에 기록한 뒤 버킷을 닫음
//! 4. 스윕 종료

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchivalSweep;
use crate::bucket::BucketKey;
use crate::clock::{Clock, SystemClock};
use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::listener::Listener;
use crate::queue::ingest_queue;
use crate::rotation::RotationPolicy;
use crate::stats::{CollectorStats, StatsSnapshot};
use crate::worker::PersistenceWorker;

/// 수집기 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 실행 중인 백그라운드 작업
struct RunningTasks {
    cancel: CancellationToken,
    listener: JoinHandle<()>,
    worker: JoinHandle<usize>,
    sweep: Option<JoinHandle<()>>,
}

/// 로그 수집기
///
/// # 사용 예시
/// ```ignore
/// use logcollect_collector::{CollectorConfig, LogCollectorBuilder};
///
/// let mut collector = LogCollectorBuilder::new().config(config).build()?;
/// collector.start().await?;
/// // ... 종료 신호 대기 ...
/// collector.stop().await?;
/// ```
pub struct LogCollector {
    config: CollectorConfig,
    state: CollectorState,
    clock: Arc<dyn Clock>,
    stats: Arc<CollectorStats>,
    local_addr: Option<SocketAddr>,
    active: Option<watch::Receiver<Option<BucketKey>>>,
    tasks: Option<RunningTasks>,
}

impl LogCollector {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            CollectorState::Initialized => "initialized",
            CollectorState::Running => "running",
            CollectorState::Stopped => "stopped",
        }
    }

    /// 수집기 설정
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// 카운터 스냅샷을 반환합니다.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 실제로 바인드된 UDP 주소 (실행 중일 때만)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 현재 쓰기용으로 열린 버킷 키
    pub fn active_bucket(&self) -> Option<BucketKey> {
        self.active.as_ref().and_then(|rx| *rx.borrow())
    }

    /// 수집을 시작합니다.
    ///
    /// 저장소 디렉토리 확인, 첫 버킷 생성, 소켓 바인드 중 하나라도 실패하면
    /// 아무 작업도 시작하지 않고 에러를 반환합니다.
    pub async fn start(&mut self) -> Result<(), CollectorError> {
        if self.state == CollectorState::Running {
            return Err(CollectorError::AlreadyRunning);
        }

        let dir = &self.config.storage_dir;
        tracing::info!(dir = %dir.display(), addr = %self.config.bind_addr, "starting log collector");

        if !tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
            return Err(CollectorError::StorageDirMissing {
                path: dir.display().to_string(),
            });
        }

        let cancel = CancellationToken::new();
        let (queue_tx, queue_rx) = ingest_queue(self.config.queue_capacity, Arc::clone(&self.stats));

        // 1. 첫 버킷 생성 (데이터그램 도착 전)
        let rotation = RotationPolicy::new(dir.clone(), Arc::clone(&self.clock), Arc::clone(&self.stats));
        let active = rotation.subscribe();
        let mut worker =
            PersistenceWorker::new(rotation, queue_rx, Arc::clone(&self.stats), cancel.clone());
        let first = worker.open_initial_bucket()?;
        tracing::info!(bucket = %first, "initial bucket ready");

        // 2. 소켓 바인드
        let listener = Listener::bind(&self.config, queue_tx, Arc::clone(&self.stats))
            .await?
            .with_clock(Arc::clone(&self.clock));
        let local_addr = listener.local_addr()?;

        // 3. 백그라운드 작업 스폰
        let runtime = Handle::current();
        let worker = tokio::task::spawn_blocking(move || worker.run_blocking(&runtime));
        let listener = tokio::spawn(listener.run(cancel.clone()));

        let sweep = if self.config.archive_enabled {
            let sweep = ArchivalSweep::new(
                dir.clone(),
                Arc::clone(&self.clock),
                active.clone(),
                Arc::clone(&self.stats),
            )
            .with_retention(self.config.retention)
            .with_interval(self.config.sweep_interval)
            .with_level(self.config.compression_level);
            Some(tokio::spawn(sweep.run(cancel.clone())))
        } else {
            tracing::info!("archival sweep disabled");
            None
        };

        self.tasks = Some(RunningTasks {
            cancel,
            listener,
            worker,
            sweep,
        });
        self.local_addr = Some(local_addr);
        self.active = Some(active);
        self.state = CollectorState::Running;
        tracing::info!(addr = %local_addr, "log collector started");
        Ok(())
    }

    /// 수집을 멈추고 큐에 남은 레코드를 모두 기록합니다.
    pub async fn stop(&mut self) -> Result<(), CollectorError> {
        if self.state != CollectorState::Running {
            return Err(CollectorError::NotRunning);
        }
        let Some(tasks) = self.tasks.take() else {
            return Err(CollectorError::NotRunning);
        };

        tracing::info!("stopping log collector");
        tasks.cancel.cancel();

        if let Err(e) = tasks.listener.await {
            tracing::error!(error = %e, "listener task failed");
        }
        match tasks.worker.await {
            Ok(drained) => tracing::debug!(drained, "persistence worker joined"),
            Err(e) => tracing::error!(error = %e, "persistence worker failed"),
        }
        if let Some(sweep) = tasks.sweep {
            if let Err(e) = sweep.await {
                tracing::error!(error = %e, "archival sweep task failed");
            }
        }

        self.local_addr = None;
        self.state = CollectorState::Stopped;
        let stats = self.stats.snapshot();
        tracing::info!(
            received = stats.received,
            persisted = stats.persisted,
            dropped = stats.dropped,
            "log collector stopped"
        );
        Ok(())
    }
}

/// 수집기 빌더
pub struct LogCollectorBuilder {
    config: CollectorConfig,
    clock: Arc<dyn Clock>,
    stats: Option<Arc<CollectorStats>>,
}

impl LogCollectorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: CollectorConfig::default(),
            clock: Arc::new(SystemClock),
            stats: None,
        }
    }

    /// 수집기 설정을 지정합니다.
    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// 버킷 회전과 아카이브 나이 계산에 쓸 시계를 지정합니다.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 외부에서 공유할 통계 객체를 지정합니다.
    pub fn stats(mut self, stats: Arc<CollectorStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// 수집기를 빌드합니다.
    pub fn build(self) -> Result<LogCollector, CollectorError> {
        self.config.validate()?;
        Ok(LogCollector {
            config: self.config,
            state: CollectorState::Initialized,
            clock: self.clock,
            stats: self.stats.unwrap_or_default(),
            local_addr: None,
            active: None,
            tasks: None,
        })
    }
}

impl Default for LogCollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
