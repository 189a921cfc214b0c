//! 시간 단위 버킷 -- 파일 이름 규칙과 SQLite 저장소
//!
//! 버킷 하나는 로컬 시각 기준 한 시간 구간의 로그 행을 담는 SQLite 파일입니다.
//!
//! # 파일 이름 규칙
//! ```text
//! <dir>/YYYYMMDDHH.sqlite3        활성 또는 닫힌 버킷
//! <dir>/YYYYMMDDHH.sqlite3.zst    아카이브된 버킷
//! ```
//!
//! # 스키마
//! ```sql
//! CREATE TABLE IF NOT EXISTS log (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     timestamp INTEGER, host TEXT, message TEXT
//! );
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use rusqlite::{Connection, params};

use crate::error::CollectorError;
use crate::record::LogRecord;

/// 버킷 파일 확장자
pub const BUCKET_EXTENSION: &str = "sqlite3";

/// `YYYYMMDDHH.sqlite3` 파일 이름 길이
pub const BUCKET_FILE_NAME_LEN: usize = 10 + 1 + BUCKET_EXTENSION.len();

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS log (\
    id INTEGER PRIMARY KEY AUTOINCREMENT, \
    timestamp INTEGER, \
    host TEXT, \
    message TEXT);";

const INSERT_SQL: &str = "INSERT INTO log (timestamp, host, message) VALUES (?1, ?2, ?3)";

/// 버킷 식별자 (로컬 시각 기준 연/월/일/시)
///
/// 필드 순서대로 정렬되므로 시간 순 비교가 가능합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl BucketKey {
    /// 로컬 시각이 속한 버킷 키를 계산합니다.
    pub fn from_datetime(at: &DateTime<Local>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            day: at.day(),
            hour: at.hour(),
        }
    }

    /// epoch 초가 로컬 시각으로 속한 버킷 키. 표현할 수 없는 시각이면 `None`.
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        Local
            .timestamp_opt(secs, 0)
            .single()
            .map(|at| Self::from_datetime(&at))
    }

    /// 버킷 파일 이름 (`YYYYMMDDHH.sqlite3`)
    pub fn file_name(&self) -> String {
        format!("{self}.{BUCKET_EXTENSION}")
    }

    /// 디렉토리 내 버킷 파일 경로
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// 파일 이름을 버킷 키로 해석합니다.
    ///
    /// 길이와 형태가 `YYYYMMDDHH.sqlite3`와 정확히 일치하고,
    /// 달력상 유효한 날짜/시각일 때만 `Some`을 반환합니다.
    pub fn parse(file_name: &str) -> Option<Self> {
        if file_name.len() != BUCKET_FILE_NAME_LEN || !file_name.is_ascii() {
            return None;
        }
        let (stamp, ext) = file_name.split_at(10);
        if ext.strip_prefix('.')? != BUCKET_EXTENSION {
            return None;
        }
        if !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let key = Self {
            year: stamp[0..4].parse().ok()?,
            month: stamp[4..6].parse().ok()?,
            day: stamp[6..8].parse().ok()?,
            hour: stamp[8..10].parse().ok()?,
        };
        if key.hour > 23 || NaiveDate::from_ymd_opt(key.year, key.month, key.day).is_none() {
            return None;
        }
        Some(key)
    }

    /// 버킷 구간의 시작 시각 (로컬)
    ///
    /// 서머타임으로 중복되는 시각은 이른 쪽을, 존재하지 않는 시각은 `None`을 반환합니다.
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        let naive = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, 0, 0)?;
        Local.from_local_datetime(&naive).earliest()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour
        )
    }
}

/// 쓰기용으로 열린 버킷
///
/// SQLite 연결을 단독 소유합니다. 영속화 워커 외에는 접근하지 않으므로
/// 별도 잠금이 필요 없습니다.
pub struct BucketWriter {
    key: BucketKey,
    path: PathBuf,
    conn: Connection,
}

impl BucketWriter {
    /// 버킷 파일을 열거나 생성하고 스키마를 보장합니다.
    pub fn open(dir: &Path, key: BucketKey) -> Result<Self, CollectorError> {
        let path = key.path_in(dir);
        let open_err = |e: rusqlite::Error| CollectorError::BucketOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let conn = Connection::open(&path).map_err(open_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(open_err)?;

        tracing::debug!(bucket = %key, path = %path.display(), "bucket opened");
        Ok(Self { key, path, conn })
    }

    /// 레코드 한 건을 삽입하고 할당된 행 id를 반환합니다.
    pub fn insert(&mut self, record: &LogRecord) -> Result<i64, CollectorError> {
        let mut stmt = self
            .conn
            .prepare_cached(INSERT_SQL)
            .map_err(|e| CollectorError::Insert(e.to_string()))?;
        stmt.execute(params![
            record.received_at,
            record.source_host,
            record.message
        ])
        .map_err(|e| CollectorError::Insert(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 버킷의 행 수를 반환합니다.
    pub fn row_count(&self) -> Result<i64, CollectorError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM log", [], |row| row.get(0))?)
    }

    pub fn key(&self) -> BucketKey {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 연결을 닫습니다. 닫힌 버킷은 다시 쓰기용으로 열리지 않습니다.
    pub fn close(self) -> Result<(), CollectorError> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| CollectorError::Sqlite(e))?;
        tracing::debug!(path = %path.display(), "bucket closed");
        Ok(())
    }
}

impl fmt::Debug for BucketWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketWriter")
            .field("key", &self.key)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
