//! 버킷 회전 정책
//!
//! [`RotationPolicy`]는 현재 쓰기용으로 열린 버킷과 그 시간 키를 관리합니다.
//! 검사할 때마다 현재 로컬 시각의 버킷 키를 계산하고, 열린 버킷과 다르면
//! 기존 버킷을 먼저 닫은 뒤 새 버킷을 열거나 생성합니다.
//!
//! # 불변 조건
//! - 쓰기용으로 열린 버킷은 항상 최대 하나
//! - 한 번 지나간 버킷은 다시 쓰기용으로 열지 않음
//!   (벽시계가 뒤로 가면 현재 버킷을 계속 사용)
//!
//! 활성 버킷 키는 `tokio::sync::watch` 채널로 게시되어
//! 아카이브 스윕이 활성 버킷을 건너뛸 수 있게 합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use crate::bucket::{BucketKey, BucketWriter};
use crate::clock::Clock;
use crate::error::CollectorError;
use crate::stats::CollectorStats;

/// 회전 검사 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// 활성 버킷 유지
    Unchanged,
    /// 새 버킷으로 전환됨
    Rotated {
        /// 이전 활성 버킷 (시작 시에는 None)
        from: Option<BucketKey>,
        /// 새 활성 버킷
        to: BucketKey,
    },
}

/// 시간 단위 버킷 회전 정책
pub struct RotationPolicy {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    stats: Arc<CollectorStats>,
    current: Option<BucketWriter>,
    /// 지금까지 연 가장 늦은 버킷 키
    last_key: Option<BucketKey>,
    active_tx: watch::Sender<Option<BucketKey>>,
    skew_warned: bool,
}

impl RotationPolicy {
    /// 새 정책을 생성합니다. 버킷은 첫 [`check`](Self::check) 호출 시 열립니다.
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>, stats: Arc<CollectorStats>) -> Self {
        let (active_tx, _) = watch::channel(None);
        Self {
            dir: dir.into(),
            clock,
            stats,
            current: None,
            last_key: None,
            active_tx,
            skew_warned: false,
        }
    }

    /// 활성 버킷 키 구독 채널을 반환합니다.
    pub fn subscribe(&self) -> watch::Receiver<Option<BucketKey>> {
        self.active_tx.subscribe()
    }

    /// 현재 시각 기준으로 활성 버킷을 점검하고 필요하면 전환합니다.
    ///
    /// 새 버킷 열기에 실패하면 에러를 반환하며, 이때 쓰기용 버킷은 없는 상태가 됩니다.
    /// 다음 검사에서 다시 시도합니다.
    pub fn check(&mut self) -> Result<Rotation, CollectorError> {
        let key = BucketKey::from_datetime(&self.clock.now());

        if let Some(last) = self.last_key {
            if key < last {
                if !self.skew_warned {
                    tracing::warn!(
                        now = %key,
                        active = %last,
                        "wall clock moved backwards, keeping current bucket"
                    );
                    self.skew_warned = true;
                }
                return Ok(Rotation::Unchanged);
            }
        }

        self.open(key)
    }

    /// 레코드 수신 시각의 버킷이 활성 버킷보다 늦으면 그 버킷으로 전환합니다.
    ///
    /// 같거나 이른 시각이면 아무것도 하지 않습니다.
    pub fn advance_to(&mut self, key: BucketKey) -> Result<Rotation, CollectorError> {
        match self.last_key {
            Some(last) if key <= last => Ok(Rotation::Unchanged),
            _ => self.open(key),
        }
    }

    fn open(&mut self, key: BucketKey) -> Result<Rotation, CollectorError> {
        if self.last_key == Some(key) && self.current.is_some() {
            return Ok(Rotation::Unchanged);
        }

        let from = self.current.as_ref().map(BucketWriter::key);

        // 새 버킷을 열기 전에 기존 버킷을 반드시 닫음
        if let Some(writer) = self.current.take() {
            let closed = writer.key();
            if let Err(e) = writer.close() {
                tracing::warn!(bucket = %closed, error = %e, "failed to close bucket cleanly");
            }
        }

        let writer = BucketWriter::open(&self.dir, key)?;
        tracing::info!(
            bucket = %key,
            path = %writer.path().display(),
            previous = ?from.map(|k| k.to_string()),
            "bucket rotated"
        );

        self.current = Some(writer);
        self.last_key = Some(key);
        self.skew_warned = false;
        self.active_tx.send_replace(Some(key));
        self.stats.record_rotation();

        Ok(Rotation::Rotated { from, to: key })
    }

    /// 활성 버킷에 대한 가변 참조를 반환합니다.
    pub fn writer_mut(&mut self) -> Option<&mut BucketWriter> {
        self.current.as_mut()
    }

    /// 활성 버킷 키
    pub fn active_key(&self) -> Option<BucketKey> {
        self.current.as_ref().map(BucketWriter::key)
    }

    /// 활성 버킷 경로
    pub fn active_path(&self) -> Option<&Path> {
        self.current.as_ref().map(BucketWriter::path)
    }

    /// 버킷 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 활성 버킷을 닫습니다 (종료 시 호출).
    pub fn close(&mut self) -> Result<(), CollectorError> {
        match self.current.take() {
            Some(writer) => writer.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, Local, TimeZone};

    fn setup(
        y: i32,
        mo: u32,
        d: u32,
        h: u32,
        mi: u32,
    ) -> (tempfile::TempDir, Arc<ManualClock>, RotationPolicy) {
        let dir = tempfile::tempdir().unwrap();
        let start = Local.with_ymd_and_hms(y, mo, d, h, mi, 0).earliest().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let policy = RotationPolicy::new(
            dir.path(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::new(CollectorStats::new()),
        );
        (dir, clock, policy)
    }

    #[test]
    fn first_check_opens_current_hour() {
        let (dir, _clock, mut policy) = setup(2024, 1, 1, 0, 30);
        assert!(policy.writer_mut().is_none());

        let rotation = policy.check().unwrap();
        let key = BucketKey::parse("2024010100.sqlite3").unwrap();
        assert_eq!(rotation, Rotation::Rotated { from: None, to: key });
        assert_eq!(policy.active_key(), Some(key));
        assert!(dir.path().join("2024010100.sqlite3").exists());
    }

    #[test]
    fn same_hour_keeps_bucket() {
        let (_dir, clock, mut policy) = setup(2024, 1, 1, 0, 0);
        policy.check().unwrap();
        clock.advance(Duration::minutes(59));
        assert_eq!(policy.check().unwrap(), Rotation::Unchanged);
    }

    #[test]
    fn hour_change_rotates_and_publishes() {
        let (dir, clock, mut policy) = setup(2024, 1, 1, 0, 59);
        let mut active = policy.subscribe();
        policy.check().unwrap();
        assert_eq!(
            *active.borrow_and_update(),
            BucketKey::parse("2024010100.sqlite3")
        );

        clock.advance(Duration::minutes(1));
        let rotation = policy.check().unwrap();
        assert_eq!(
            rotation,
            Rotation::Rotated {
                from: BucketKey::parse("2024010100.sqlite3"),
                to: BucketKey::parse("2024010101.sqlite3").unwrap(),
            }
        );
        assert_eq!(
            *active.borrow_and_update(),
            BucketKey::parse("2024010101.sqlite3")
        );
        assert!(dir.path().join("2024010101.sqlite3").exists());
    }

    #[test]
    fn clock_going_back_never_reopens_past_bucket() {
        let (_dir, clock, mut policy) = setup(2024, 1, 1, 5, 0);
        policy.check().unwrap();
        clock.advance(Duration::hours(-2));

        assert_eq!(policy.check().unwrap(), Rotation::Unchanged);
        assert_eq!(policy.active_key(), BucketKey::parse("2024010105.sqlite3"));
    }

    #[test]
    fn advance_to_moves_forward_only() {
        let (dir, clock, mut policy) = setup(2024, 1, 1, 0, 59);
        policy.check().unwrap();
        let next = BucketKey::parse("2024010101.sqlite3").unwrap();

        // 시계 검사보다 먼저 다음 시간대 레코드가 도착
        assert_eq!(
            policy.advance_to(next).unwrap(),
            Rotation::Rotated {
                from: BucketKey::parse("2024010100.sqlite3"),
                to: next,
            }
        );
        assert_eq!(
            policy.active_path(),
            Some(dir.path().join("2024010101.sqlite3").as_path())
        );

        let earlier = BucketKey::parse("2024010100.sqlite3").unwrap();
        assert_eq!(policy.advance_to(earlier).unwrap(), Rotation::Unchanged);
        assert_eq!(policy.advance_to(next).unwrap(), Rotation::Unchanged);

        // 시계가 따라와도 추가 전환 없음
        clock.set(Local.with_ymd_and_hms(2024, 1, 1, 1, 0, 5).earliest().unwrap());
        assert_eq!(policy.check().unwrap(), Rotation::Unchanged);
        assert_eq!(policy.active_key(), Some(next));
    }

    #[test]
    fn open_failure_leaves_no_writer_and_retries() {
        let start = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).earliest().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut policy = RotationPolicy::new(
            "/nonexistent/logcollect/db",
            clock as Arc<dyn Clock>,
            Arc::new(CollectorStats::new()),
        );

        assert!(matches!(
            policy.check(),
            Err(CollectorError::BucketOpen { .. })
        ));
        assert!(policy.writer_mut().is_none());
        // 같은 시간대에서도 다시 시도
        assert!(policy.check().is_err());
    }

    #[test]
    fn close_releases_writer() {
        let (_dir, _clock, mut policy) = setup(2024, 1, 1, 0, 0);
        policy.check().unwrap();
        policy.close().unwrap();
        assert!(policy.active_key().is_none());
        policy.close().unwrap();
    }
}
