//! UDP 리스너 -- 데이터그램 수신 후 인제스트 큐에 적재
//!
//! 리스너는 소켓을 단독 소유하며, 데이터그램 하나당 [`LogRecord`] 하나를 만들어
//! 큐에 넣습니다. 큐가 가득 차면 레코드는 드롭되며 송신자에게는 아무것도 알리지 않습니다.
//!
//! 수신 대기는 타임아웃이 있어 유휴 상태에서도 CPU를 소모하지 않으며,
//! 취소 신호에 즉시 반응합니다.

use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::queue::IngestSender;
use crate::record::LogRecord;
use crate::stats::CollectorStats;

/// 수신 대기 타임아웃
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// 현재 프로세스가 root 권한(euid 0)으로 실행 중인지 확인합니다.
pub fn running_privileged() -> bool {
    // SAFETY: geteuid는 항상 성공하며 부작용이 없음
    unsafe { libc::geteuid() == 0 }
}

/// UDP syslog 리스너
pub struct Listener {
    socket: UdpSocket,
    queue: IngestSender,
    stats: Arc<CollectorStats>,
    clock: Arc<dyn Clock>,
    max_message_size: usize,
}

impl Listener {
    /// 설정된 주소에 UDP 소켓을 바인드합니다.
    ///
    /// 바인드 실패는 치명적 에러입니다.
    /// 수신 버퍼 크기 조정 실패는 경고만 남기고 계속합니다.
    pub async fn bind(
        config: &CollectorConfig,
        queue: IngestSender,
        stats: Arc<CollectorStats>,
    ) -> Result<Self, CollectorError> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|e| CollectorError::Bind {
                addr: config.bind_addr.to_string(),
                reason: e.to_string(),
            })?;

        if config.recv_buffer_size > 0 {
            if let Err(e) = set_recv_buffer_size(&socket, config.recv_buffer_size) {
                tracing::warn!(
                    requested = config.recv_buffer_size,
                    error = %e,
                    "failed to set socket receive buffer size, using OS default"
                );
            }
        }

        let local = socket.local_addr()?;
        tracing::info!(addr = %local, "udp listener bound");

        Ok(Self {
            socket,
            queue,
            stats,
            clock: Arc::new(SystemClock),
            max_message_size: config.max_message_size,
        })
    }

    /// 수신 시각을 찍을 시계를 지정합니다. 버킷 회전과 같은 시계를 써야 합니다.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 실제로 바인드된 주소 (포트 0으로 바인드한 경우 할당된 포트 확인용)
    pub fn local_addr(&self) -> Result<SocketAddr, CollectorError> {
        Ok(self.socket.local_addr()?)
    }

    /// 취소될 때까지 데이터그램을 수신합니다.
    ///
    /// 수신 에러는 로그 후 계속합니다.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.max_message_size];

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("udp listener shutting down");
                    break;
                }
                result = tokio::time::timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf)) => {
                    match result {
                        Ok(Ok((len, peer))) => self.handle_datagram(peer, &buf[..len]),
                        Ok(Err(e)) => {
                            tracing::warn!(error = %e, "udp receive failed");
                        }
                        Err(_) => {
                            tracing::trace!("udp receive timeout");
                        }
                    }
                }
            }
        }
    }

    fn handle_datagram(&self, peer: SocketAddr, payload: &[u8]) {
        let received_at = self.clock.now().timestamp();
        let record = LogRecord::from_datagram(received_at, peer, payload);
        self.stats.record_received();

        tracing::trace!(peer = %peer, bytes = payload.len(), "datagram received");
        // 드롭 시 로그와 카운트는 큐가 처리
        self.queue.push(record);
    }
}

fn set_recv_buffer_size(socket: &UdpSocket, size: usize) -> std::io::Result<()> {
    let value = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);
    // SAFETY: 유효한 소켓 fd와 c_int 크기의 옵션 값을 전달
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            (&raw const value).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
