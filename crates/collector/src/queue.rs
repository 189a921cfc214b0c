//! 인제스트 큐 -- 리스너와 영속화 워커 사이의 유한 FIFO
//!
//! [`ingest_queue`]는 `tokio::sync::mpsc` 유한 채널을 감싼 송신/수신 쌍을 생성합니다.
//!
//! # 오버플로우 정책
//! 큐가 가득 차면 새 레코드는 즉시 드롭됩니다 (송신측은 절대 대기하지 않음).
//! UDP 송신자에게는 어떤 역압(backpressure)도 전달되지 않습니다.
//!
//! # 수신측
//! 수신측은 타임아웃이 있는 대기를 사용하므로, 큐가 비어 있어도 CPU를 소모하지 않고
//! 주기적으로 깨어나 버킷 회전 검사를 수행할 수 있습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use logcollect_core::metrics as m;

use crate::record::LogRecord;
use crate::stats::CollectorStats;

/// 기본 큐 용량
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// 드롭 로그를 warn 레벨로 남기는 간격 (그 사이는 debug)
const DROP_WARN_EVERY: u64 = 1000;

/// 수신 결과
#[derive(Debug, PartialEq, Eq)]
pub enum Popped {
    /// 레코드 하나를 꺼냄
    Record(LogRecord),
    /// 대기 시간 동안 도착한 레코드 없음
    Empty,
    /// 송신측이 모두 사라졌거나 큐가 닫혔고 남은 레코드도 없음
    Closed,
}

/// 유한 인제스트 큐를 생성합니다.
///
/// # Panics
/// `capacity`가 0이면 패닉합니다 (설정 검증 단계에서 걸러짐).
pub fn ingest_queue(capacity: usize, stats: Arc<CollectorStats>) -> (IngestSender, IngestReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (IngestSender { tx, stats }, IngestReceiver { rx })
}

/// 큐 송신측 (리스너 소유)
#[derive(Clone)]
pub struct IngestSender {
    tx: mpsc::Sender<LogRecord>,
    stats: Arc<CollectorStats>,
}

impl IngestSender {
    /// 레코드를 큐에 넣습니다.
    ///
    /// 큐가 가득 찼거나 닫혔으면 레코드를 드롭하고 `false`를 반환합니다.
    /// 이 호출은 절대 대기하지 않습니다.
    pub fn push(&self, record: LogRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => {
                #[allow(clippy::cast_precision_loss)]
                metrics::gauge!(m::QUEUE_DEPTH).set(self.len() as f64);
                true
            }
            Err(TrySendError::Full(record)) => {
                let dropped = self.stats.record_dropped();
                if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
                    tracing::warn!(
                        dropped,
                        capacity = self.capacity(),
                        host = %record.source_host,
                        "ingest queue full, dropping record"
                    );
                } else {
                    tracing::debug!(
                        dropped,
                        host = %record.source_host,
                        "ingest queue full, dropping record"
                    );
                }
                false
            }
            Err(TrySendError::Closed(record)) => {
                self.stats.record_dropped();
                tracing::debug!(
                    host = %record.source_host,
                    "ingest queue closed, dropping record"
                );
                false
            }
        }
    }

    /// 현재 큐에 대기 중인 레코드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 큐 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// 수신측이 큐를 닫았는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 큐 수신측 (영속화 워커 소유)
pub struct IngestReceiver {
    rx: mpsc::Receiver<LogRecord>,
}

impl IngestReceiver {
    /// 최대 `wait` 동안 레코드 하나를 기다립니다.
    pub async fn pop(&mut self, wait: Duration) -> Popped {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(record)) => {
                self.report_depth();
                Popped::Record(record)
            }
            Ok(None) => Popped::Closed,
            Err(_) => Popped::Empty,
        }
    }

    /// 블로킹 스레드에서 최대 `wait` 동안 레코드 하나를 기다립니다.
    ///
    /// `tokio::task::spawn_blocking` 스레드처럼 비동기 컨텍스트 밖에서 호출해야 합니다.
    /// 타이머는 `runtime`이 구동합니다.
    pub fn pop_blocking(&mut self, runtime: &Handle, wait: Duration) -> Popped {
        runtime.block_on(self.pop(wait))
    }

    /// 대기 없이 레코드 하나를 꺼냅니다.
    pub fn try_pop(&mut self) -> Popped {
        match self.rx.try_recv() {
            Ok(record) => {
                self.report_depth();
                Popped::Record(record)
            }
            Err(TryRecvError::Empty) if self.rx.is_closed() => Popped::Closed,
            Err(TryRecvError::Empty) => Popped::Empty,
            Err(TryRecvError::Disconnected) => Popped::Closed,
        }
    }

    /// 큐를 닫습니다.
    ///
    /// 이후의 `push`는 모두 거부되며, 이미 들어온 레코드는 계속 꺼낼 수 있습니다.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// 현재 큐에 대기 중인 레코드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 큐가 닫혔거나 송신측이 모두 사라졌는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    fn report_depth(&self) {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::QUEUE_DEPTH).set(self.rx.len() as f64);
    }
}
