//! 수집기 통계 -- 프로세스 내부 카운터와 Prometheus 메트릭
//!
//! [`CollectorStats`]는 리스너, 영속화 워커, 아카이브 스윕이 공유하는
//! 원자적 카운터 묶음입니다. 각 기록 메서드는 동일한 값을 `metrics`
//! 매크로로도 내보내므로, 레코더가 설치된 경우 Prometheus에서 관찰할 수 있습니다.

use std::sync::atomic::{AtomicU64, Ordering};

use logcollect_core::metrics as m;
use serde::Serialize;

/// 공유 카운터 묶음
#[derive(Debug, Default)]
pub struct CollectorStats {
    received: AtomicU64,
    dropped: AtomicU64,
    persisted: AtomicU64,
    insert_failures: AtomicU64,
    rotations: AtomicU64,
    archived: AtomicU64,
}

/// 특정 시점의 카운터 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// 수신한 데이터그램 수
    pub received: u64,
    /// 큐 포화 또는 종료로 드롭된 레코드 수
    pub dropped: u64,
    /// 버킷에 저장된 레코드 수
    pub persisted: u64,
    /// INSERT 실패로 버려진 레코드 수
    pub insert_failures: u64,
    /// 버킷 회전 횟수 (시작 시 첫 버킷 포함)
    pub rotations: u64,
    /// 압축된 버킷 수
    pub archived: u64,
}

impl CollectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::DATAGRAMS_RECEIVED_TOTAL).increment(1);
    }

    pub fn record_dropped(&self) -> u64 {
        metrics::counter!(m::RECORDS_DROPPED_TOTAL).increment(1);
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::RECORDS_PERSISTED_TOTAL).increment(1);
    }

    pub fn record_insert_failure(&self) {
        self.insert_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::INSERT_ERRORS_TOTAL).increment(1);
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::BUCKET_ROTATIONS_TOTAL).increment(1);
    }

    pub fn record_archived(&self) {
        self.archived.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::BUCKETS_ARCHIVED_TOTAL).increment(1);
    }

    /// 현재 카운터 값을 읽습니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            insert_failures: self.insert_failures.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            archived: self.archived.load(Ordering::Relaxed),
        }
    }
}
