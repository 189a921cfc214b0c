//! 영속화 워커 -- 인제스트 큐를 비우며 활성 버킷에 레코드를 기록합니다.
//!
//! 워커는 `tokio::task::spawn_blocking` 스레드에서 실행되며 SQLite 연결을 단독 소유합니다.
//!
//! # 루프
//! ```text
//! loop {
//!     (a) RotationPolicy::check()        // 시간이 바뀌었으면 버킷 전환
//!     (b) queue.pop_blocking(timeout)     // 비어 있으면 (a)로 돌아감
//!     (c) RotationPolicy::advance_to()    // 수신 시각이 더 늦은 시간대면 전환
//!     (d) writer.insert(record)           // 실패 시 로그 후 버림 (재시도 없음)
//! }
//! ```
//!
//! 취소 신호를 받으면 큐를 닫고, 남은 레코드를 모두 활성 버킷에 기록한 뒤
//! 버킷을 닫고 종료합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::bucket::BucketKey;
use crate::error::CollectorError;
use crate::queue::{IngestReceiver, Popped};
use crate::record::LogRecord;
use crate::rotation::{Rotation, RotationPolicy};
use crate::stats::CollectorStats;

/// 큐가 비었을 때 회전 검사 사이의 최대 대기 시간
pub const DEFAULT_POP_TIMEOUT: Duration = Duration::from_millis(250);

/// 영속화 워커
pub struct PersistenceWorker {
    rotation: RotationPolicy,
    queue: IngestReceiver,
    stats: Arc<CollectorStats>,
    cancel: CancellationToken,
    pop_timeout: Duration,
}

impl PersistenceWorker {
    /// 새 워커를 생성합니다.
    pub fn new(
        rotation: RotationPolicy,
        queue: IngestReceiver,
        stats: Arc<CollectorStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rotation,
            queue,
            stats,
            cancel,
            pop_timeout: DEFAULT_POP_TIMEOUT,
        }
    }

    /// 큐 대기 타임아웃을 설정합니다.
    pub fn with_pop_timeout(mut self, timeout: Duration) -> Self {
        self.pop_timeout = timeout;
        self
    }

    /// 첫 버킷을 엽니다.
    ///
    /// 수신 루프 시작 전에 호출되며, 실패는 치명적 에러로 취급됩니다.
    pub fn open_initial_bucket(&mut self) -> Result<BucketKey, CollectorError> {
        match self.rotation.check()? {
            Rotation::Rotated { to, .. } => Ok(to),
            Rotation::Unchanged => self
                .rotation
                .active_key()
                .ok_or(CollectorError::NoActiveBucket),
        }
    }

    /// 취소될 때까지 큐를 비우며 레코드를 기록합니다.
    ///
    /// 블로킹 스레드에서 호출해야 하며, `runtime`은 큐 대기 타이머를 구동합니다.
    /// 종료 시 드레인한 레코드 수를 반환합니다.
    pub fn run_blocking(mut self, runtime: &Handle) -> usize {
        tracing::info!(dir = %self.rotation.dir().display(), "persistence worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.rotate();

            match self.queue.pop_blocking(runtime, self.pop_timeout) {
                Popped::Record(record) => self.persist(&record),
                Popped::Empty => {}
                Popped::Closed => {
                    tracing::info!("ingest queue closed by producer");
                    break;
                }
            }
        }

        let drained = self.drain();

        if let Err(e) = self.rotation.close() {
            tracing::error!(error = %e, "failed to close active bucket");
        }
        tracing::info!(drained, "persistence worker stopped");
        drained
    }

    fn rotate(&mut self) {
        if let Err(e) = self.rotation.check() {
            tracing::error!(error = %e, "bucket rotation failed, records will be dropped until it succeeds");
        }
    }

    /// 레코드 한 건을 수신 시각의 버킷에 기록합니다. 실패는 로그 후 버립니다.
    ///
    /// 수신 시각이 활성 버킷보다 늦으면 먼저 그 버킷으로 전환합니다.
    /// 이른 시각의 레코드는 활성 버킷에 기록합니다 (지난 버킷은 다시 열지 않음).
    fn persist(&mut self, record: &LogRecord) {
        if let Some(key) = BucketKey::from_timestamp(record.received_at) {
            if let Err(e) = self.rotation.advance_to(key) {
                tracing::error!(bucket = %key, error = %e, "failed to open bucket for record receipt hour");
            }
        }

        let Some(writer) = self.rotation.writer_mut() else {
            self.stats.record_insert_failure();
            tracing::warn!(
                host = %record.source_host,
                timestamp = record.received_at,
                "no active bucket, record discarded"
            );
            return;
        };

        match writer.insert(record) {
            Ok(id) => {
                self.stats.record_persisted();
                tracing::trace!(id, bucket = %writer.key(), "record persisted");
            }
            Err(e) => {
                self.stats.record_insert_failure();
                tracing::warn!(
                    error = %e,
                    bucket = %writer.key(),
                    host = %record.source_host,
                    "insert failed, record discarded"
                );
            }
        }
    }

    /// 큐를 닫고 남은 레코드를 모두 기록합니다.
    fn drain(&mut self) -> usize {
        self.queue.close();

        let mut drained = 0;
        while let Popped::Record(record) = self.queue.try_pop() {
            self.persist(&record);
            drained += 1;
        }
        if drained > 0 {
            tracing::info!(count = drained, "drained buffered records into active bucket");
        }
        drained
    }
}
