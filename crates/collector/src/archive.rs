//! 아카이브 스윕 -- 보존 기간이 지난 버킷을 zstd로 압축
//!
//! [`ArchivalSweep`]는 인제스트 경로와 독립적으로 주기 실행됩니다.
//! 한 번의 스윕은 버킷 디렉토리를 훑어 다음 규칙으로 각 항목을 처리합니다.
//!
//! | 조건 | 처리 |
//! |------|------|
//! | 파일 이름이 `YYYYMMDDHH.sqlite3`와 정확히 일치하지 않음 | 무시 |
//! | 현재 쓰기용으로 열린 버킷 | 건너뜀 (나이와 무관) |
//! | 나이 < 보존 기간 | 유지 |
//! | 그 외 | `YYYYMMDDHH.sqlite3.zst`로 압축 후 원본 삭제 |
//!
//! 나이는 `현재 시각 - 버킷 구간 시작 시각`입니다.
//! 개별 항목의 실패는 로그만 남기고 스윕을 계속합니다.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::bucket::BucketKey;
use crate::clock::Clock;
use crate::error::CollectorError;
use crate::stats::CollectorStats;

/// 압축 산출물 접미사
pub const ARCHIVE_SUFFIX: &str = "zst";

/// 기본 보존 기간 (7일)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 86_400);

/// 기본 스윕 주기 (1시간)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3_600);

/// 기본 zstd 압축 레벨
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// 한 번의 스윕 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 압축 후 원본을 삭제한 버킷 수
    pub archived: usize,
    /// 활성 버킷이라 건너뛴 수
    pub skipped_active: usize,
    /// 보존 기간이 지나지 않아 유지한 수
    pub too_young: usize,
    /// 버킷 이름 규칙에 맞지 않아 무시한 항목 수
    pub ignored: usize,
    /// 읽기 또는 압축에 실패한 항목 수
    pub failed: usize,
}

/// 주기적 아카이브 스윕
#[derive(Clone)]
pub struct ArchivalSweep {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    active: watch::Receiver<Option<BucketKey>>,
    stats: Arc<CollectorStats>,
    retention: Duration,
    interval: Duration,
    level: i32,
}

impl ArchivalSweep {
    /// 새 스윕을 생성합니다.
    ///
    /// `active`는 [`RotationPolicy::subscribe`](crate::rotation::RotationPolicy::subscribe)로
    /// 얻은 활성 버킷 채널입니다.
    pub fn new(
        dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        active: watch::Receiver<Option<BucketKey>>,
        stats: Arc<CollectorStats>,
    ) -> Self {
        Self {
            dir: dir.into(),
            clock,
            active,
            stats,
            retention: DEFAULT_RETENTION,
            interval: DEFAULT_SWEEP_INTERVAL,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// 보존 기간을 설정합니다.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// 스윕 주기를 설정합니다.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// zstd 압축 레벨을 설정합니다.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// 디렉토리를 한 번 훑어 대상 버킷을 압축합니다.
    ///
    /// 파일 I/O를 수행하므로 블로킹 컨텍스트에서 호출해야 합니다.
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot read bucket directory");
                report.failed += 1;
                return report;
            }
        };

        let now = self.clock.now();
        let active = *self.active.borrow();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable directory entry, skipping");
                    report.failed += 1;
                    continue;
                }
            };

            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(BucketKey::parse) else {
                report.ignored += 1;
                continue;
            };
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                report.ignored += 1;
                continue;
            }

            if active == Some(key) {
                tracing::debug!(bucket = %key, "active bucket, not archiving");
                report.skipped_active += 1;
                continue;
            }

            // 서머타임 공백으로 존재하지 않는 시각은 무시
            let Some(start) = key.start_time() else {
                report.ignored += 1;
                continue;
            };

            // 미래 버킷(음수 나이)은 to_std()가 실패하므로 유지
            match (now - start).to_std() {
                Ok(age) if age >= self.retention => {}
                _ => {
                    report.too_young += 1;
                    continue;
                }
            }

            match compress_bucket(&entry.path(), self.level) {
                Ok(archived) => {
                    report.archived += 1;
                    self.stats.record_archived();
                    tracing::info!(bucket = %key, archive = %archived.display(), "bucket archived");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(bucket = %key, error = %e, "bucket archive failed");
                }
            }
        }

        report
    }

    /// 취소될 때까지 주기적으로 스윕을 실행합니다.
    ///
    /// 첫 스윕은 즉시 실행되며, 이후 `interval`마다 반복합니다.
    /// 실행이 주기보다 길어지면 놓친 틱은 건너뜁니다.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            dir = %self.dir.display(),
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "archival sweep started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let sweep = self.clone();
                    match tokio::task::spawn_blocking(move || sweep.sweep_once()).await {
                        Ok(report) if report.archived > 0 || report.failed > 0 => {
                            tracing::info!(?report, "archival sweep finished");
                        }
                        Ok(report) => tracing::debug!(?report, "archival sweep finished"),
                        Err(e) => tracing::error!(error = %e, "archival sweep task failed"),
                    }
                }
            }
        }

        tracing::info!("archival sweep stopped");
    }
}

/// `<bucket>.zst` 경로
pub fn archive_path(bucket: &Path) -> PathBuf {
    let mut name = OsString::from(bucket.as_os_str());
    name.push(".");
    name.push(ARCHIVE_SUFFIX);
    PathBuf::from(name)
}

/// 버킷 파일 하나를 압축하고 원본을 삭제합니다.
///
/// 임시 파일에 먼저 쓰고 디스크에 동기화한 뒤 최종 이름으로 바꿉니다.
/// 원본은 압축본이 완성된 다음에만 삭제되므로, 실패하면 원본이 그대로 남습니다.
pub fn compress_bucket(bucket: &Path, level: i32) -> Result<PathBuf, CollectorError> {
    let target = archive_path(bucket);
    let mut tmp = target.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let archive_err = |e: std::io::Error| CollectorError::Archive {
        path: bucket.display().to_string(),
        reason: e.to_string(),
    };

    let written = (|| -> std::io::Result<()> {
        let mut input = File::open(bucket)?;
        let mut output = File::create(&tmp)?;
        zstd::stream::copy_encode(&mut input, &mut output, level)?;
        output.sync_all()?;
        std::fs::rename(&tmp, &target)
    })();

    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(archive_err(e));
    }

    std::fs::remove_file(bucket).map_err(archive_err)?;
    Ok(target)
}
