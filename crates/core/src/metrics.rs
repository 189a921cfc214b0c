//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 수집기는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logcollect_`
//! - 접미어: `_total` (counter), 없음 (gauge)

/// 수신한 UDP 데이터그램 수 (counter)
pub const DATAGRAMS_RECEIVED_TOTAL: &str = "logcollect_datagrams_received_total";

/// 큐 포화로 드롭된 레코드 수 (counter)
pub const RECORDS_DROPPED_TOTAL: &str = "logcollect_records_dropped_total";

/// 버킷에 저장된 레코드 수 (counter)
pub const RECORDS_PERSISTED_TOTAL: &str = "logcollect_records_persisted_total";

/// INSERT 실패 수 (counter)
pub const INSERT_ERRORS_TOTAL: &str = "logcollect_insert_errors_total";

/// 버킷 회전 횟수 (counter)
pub const BUCKET_ROTATIONS_TOTAL: &str = "logcollect_bucket_rotations_total";

/// 압축 아카이브된 버킷 수 (counter)
pub const BUCKETS_ARCHIVED_TOTAL: &str = "logcollect_buckets_archived_total";

/// 인제스트 큐 현재 길이 (gauge)
pub const QUEUE_DEPTH: &str = "logcollect_queue_depth";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        DATAGRAMS_RECEIVED_TOTAL,
        "Total number of UDP datagrams received"
    );
    describe_counter!(
        RECORDS_DROPPED_TOTAL,
        "Records dropped because the ingest queue was full or closed"
    );
    describe_counter!(
        RECORDS_PERSISTED_TOTAL,
        "Records successfully inserted into a bucket"
    );
    describe_counter!(INSERT_ERRORS_TOTAL, "Failed bucket inserts");
    describe_counter!(BUCKET_ROTATIONS_TOTAL, "Hourly bucket rotations");
    describe_counter!(
        BUCKETS_ARCHIVED_TOTAL,
        "Buckets compressed by the archival sweep"
    );
    describe_gauge!(QUEUE_DEPTH, "Records waiting in the ingest queue");
}
