//! 시계 추상화
//!
//! 버킷 회전과 아카이브 나이 계산은 현재 로컬 시각에 의존합니다.
//! [`Clock`] trait으로 분리하여 시간 경계 동작을 테스트에서 재현할 수 있게 합니다.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local};

/// 현재 시각 공급자
pub trait Clock: Send + Sync {
    /// 현재 로컬 시각
    fn now(&self) -> DateTime<Local>;
}

/// 시스템 벽시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// 수동으로 조작하는 시계
///
/// 시간 경계 통과, 보존 기간 경과 등을 재현하는 테스트용 구현입니다.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 시계를 지정한 시각으로 맞춥니다.
    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    /// 시계를 `by`만큼 앞으로 돌립니다.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
