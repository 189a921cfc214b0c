//! 통합 테스트 -- 수신부터 버킷 저장, 아카이브까지의 전체 흐름 검증

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use rusqlite::Connection;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use logcollect_collector::{
    Clock, CollectorConfig, CollectorConfigBuilder, CollectorError, CollectorStats, LogCollector,
    LogCollectorBuilder, LogRecord, ManualClock, PersistenceWorker, RotationPolicy, ingest_queue,
};

fn clock_at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Arc<ManualClock> {
    let start = Local.with_ymd_and_hms(y, mo, d, h, mi, 0).earliest().unwrap();
    Arc::new(ManualClock::new(start))
}

fn config_in(dir: &Path) -> CollectorConfig {
    CollectorConfigBuilder::new()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .storage_dir(dir)
        .queue_capacity(1024)
        .build()
        .unwrap()
}

fn collector(dir: &Path, clock: Arc<ManualClock>) -> LogCollector {
    LogCollectorBuilder::new()
        .config(config_in(dir))
        .clock(clock)
        .build()
        .unwrap()
}

fn rows(path: &Path) -> Vec<(i64, String, String)> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT timestamp, host, message FROM log ORDER BY id")
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

/// 조건이 참이 될 때까지 최대 5초 대기
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

/// 시작 직후 현재 시간대 버킷이 스키마와 함께 빈 상태로 생성됨
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_creates_empty_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let mut collector = collector(dir.path(), clock_at(2024, 1, 1, 0, 15));

    collector.start().await.unwrap();

    let bucket = dir.path().join("2024010100.sqlite3");
    assert!(bucket.exists());
    assert!(rows(&bucket).is_empty());

    collector.stop().await.unwrap();
}

/// UDP로 받은 "hello"가 활성 버킷에 한 행으로 저장됨
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_udp_datagram_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let mut collector = collector(dir.path(), clock_at(2024, 1, 1, 0, 15));
    collector.start().await.unwrap();
    let addr = collector.local_addr().unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"hello", addr).await.unwrap();
    wait_until(|| collector.stats().persisted == 1).await;

    collector.stop().await.unwrap();

    let stored = rows(&dir.path().join("2024010100.sqlite3"));
    assert_eq!(stored.len(), 1);
    let (timestamp, host, message) = &stored[0];
    assert!(*timestamp > 0);
    assert_eq!(host, "127.0.0.1");
    assert_eq!(message, "hello");
}

/// epoch 1000에 203.0.113.5에서 온 "hello"는 2024010100 버킷에 정확히 한 행
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_record_lands_in_active_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at(2024, 1, 1, 0, 0);
    let stats = Arc::new(CollectorStats::new());
    let cancel = CancellationToken::new();
    let (tx, rx) = ingest_queue(16, Arc::clone(&stats));
    let policy = RotationPolicy::new(dir.path(), clock as Arc<dyn Clock>, Arc::clone(&stats));
    let mut worker = PersistenceWorker::new(policy, rx, Arc::clone(&stats), cancel.clone());
    worker.open_initial_bucket().unwrap();

    assert!(tx.push(LogRecord::new(1000, "203.0.113.5", "hello")));

    let handle = Handle::current();
    let task = tokio::task::spawn_blocking(move || worker.run_blocking(&handle));
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(
        rows(&dir.path().join("2024010100.sqlite3")),
        vec![(1000, "203.0.113.5".to_owned(), "hello".to_owned())]
    );
}

/// 시간 경계를 넘으면 이후 레코드는 새 버킷으로 감
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hour_boundary_rotates_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock_at(2024, 1, 1, 0, 59);
    let stats = Arc::new(CollectorStats::new());
    let cancel = CancellationToken::new();
    let (tx, rx) = ingest_queue(16, Arc::clone(&stats));
    let policy = RotationPolicy::new(
        dir.path(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&stats),
    );
    let worker = PersistenceWorker::new(policy, rx, Arc::clone(&stats), cancel.clone())
        .with_pop_timeout(Duration::from_millis(20));

    let handle = Handle::current();
    let task = tokio::task::spawn_blocking(move || worker.run_blocking(&handle));

    assert!(tx.push(LogRecord::new(1, "10.0.0.1", "before")));
    wait_until(|| stats.snapshot().persisted == 1).await;

    clock.advance(chrono::Duration::minutes(1));
    wait_until(|| stats.snapshot().rotations == 2).await;

    assert!(tx.push(LogRecord::new(2, "10.0.0.1", "after")));
    wait_until(|| stats.snapshot().persisted == 2).await;

    cancel.cancel();
    task.await.unwrap();

    let first = rows(&dir.path().join("2024010100.sqlite3"));
    let second = rows(&dir.path().join("2024010101.sqlite3"));
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].2, "before");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].2, "after");
}

/// 저장소 디렉토리가 없으면 시작 실패
#[tokio::test]
async fn test_missing_storage_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut collector = collector(&dir.path().join("db"), clock_at(2024, 1, 1, 0, 0));

    let err = collector.start().await.unwrap_err();
    assert!(matches!(err, CollectorError::StorageDirMissing { .. }));
}

/// 이미 사용 중인 포트면 시작 실패
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bind_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = CollectorConfigBuilder::new()
        .bind_addr(taken.local_addr().unwrap())
        .storage_dir(dir.path())
        .build()
        .unwrap();
    let mut collector = LogCollectorBuilder::new()
        .config(config)
        .clock(clock_at(2024, 1, 1, 0, 0))
        .build()
        .unwrap();

    let err = collector.start().await.unwrap_err();
    assert!(matches!(err, CollectorError::Bind { .. }));
    assert_eq!(collector.state_name(), "initialized");
}

/// 큐 용량을 넘는 레코드는 드롭되고 나머지는 순서대로 저장됨
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_overflow_drops_excess() {
    let dir = tempfile::tempdir().unwrap();
    let stats = Arc::new(CollectorStats::new());
    let cancel = CancellationToken::new();
    let (tx, rx) = ingest_queue(4, Arc::clone(&stats));
    let policy = RotationPolicy::new(
        dir.path(),
        clock_at(2024, 1, 1, 0, 0) as Arc<dyn Clock>,
        Arc::clone(&stats),
    );
    let mut worker = PersistenceWorker::new(policy, rx, Arc::clone(&stats), cancel.clone());
    worker.open_initial_bucket().unwrap();

    let accepted = (0..10)
        .filter(|i| tx.push(LogRecord::new(*i, "10.0.0.9", format!("m{i}"))))
        .count();
    assert_eq!(accepted, 4);
    assert_eq!(stats.snapshot().dropped, 6);

    cancel.cancel();
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || worker.run_blocking(&handle))
        .await
        .unwrap();

    let messages: Vec<_> = rows(&dir.path().join("2024010100.sqlite3"))
        .into_iter()
        .map(|(_, _, m)| m)
        .collect();
    assert_eq!(messages, ["m0", "m1", "m2", "m3"]);
}

/// 종료 시 큐에 남은 레코드까지 모두 저장됨
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_graceful_stop_persists_everything_received() {
    let dir = tempfile::tempdir().unwrap();
    let mut collector = collector(dir.path(), clock_at(2024, 1, 1, 0, 30));
    collector.start().await.unwrap();
    let addr = collector.local_addr().unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for i in 0..50 {
        sender.send_to(format!("burst {i}").as_bytes(), addr).await.unwrap();
    }
    wait_until(|| collector.stats().received > 0).await;

    collector.stop().await.unwrap();

    let stats = collector.stats();
    let stored = rows(&dir.path().join("2024010100.sqlite3"));
    assert_eq!(stats.dropped, 0);
    assert_eq!(stored.len() as u64, stats.received);
    assert_eq!(stats.persisted, stats.received);
}

/// 첫 스윕에서 오래된 버킷만 압축하고 활성/최근 버킷과 무관한 파일은 유지
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweep_archives_old_buckets_only() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["2024010100", "2024010900"] {
        let conn = Connection::open(dir.path().join(format!("{name}.sqlite3"))).unwrap();
        conn.execute_batch("CREATE TABLE log (id INTEGER PRIMARY KEY AUTOINCREMENT, timestamp INTEGER, host TEXT, message TEXT);")
            .unwrap();
    }
    std::fs::write(dir.path().join("README"), b"not a bucket").unwrap();

    let mut collector = collector(dir.path(), clock_at(2024, 1, 10, 12, 0));
    collector.start().await.unwrap();
    wait_until(|| collector.stats().archived == 1).await;
    collector.stop().await.unwrap();

    assert!(!dir.path().join("2024010100.sqlite3").exists());
    assert!(dir.path().join("2024010100.sqlite3.zst").exists());
    assert!(dir.path().join("2024010900.sqlite3").exists());
    assert!(dir.path().join("2024011012.sqlite3").exists());
    assert!(dir.path().join("README").exists());
}

/// 아카이브를 끄면 오래된 버킷도 유지
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabled_archive_leaves_buckets() {
    let dir = tempfile::tempdir().unwrap();
    Connection::open(dir.path().join("2024010100.sqlite3")).unwrap();

    let config = CollectorConfigBuilder::new()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .storage_dir(dir.path())
        .archive_enabled(false)
        .build()
        .unwrap();
    let mut collector = LogCollectorBuilder::new()
        .config(config)
        .clock(clock_at(2024, 2, 1, 0, 0))
        .build()
        .unwrap();

    collector.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    collector.stop().await.unwrap();

    assert!(dir.path().join("2024010100.sqlite3").exists());
    assert_eq!(collector.stats().archived, 0);
}
