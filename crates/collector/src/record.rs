//! 수신 레코드 타입

use std::net::{IpAddr, SocketAddr};

/// 수신된 로그 레코드
///
/// 리스너가 데이터그램 하나당 하나씩 생성하며, 생성 후에는 변경되지 않습니다.
/// 큐 슬롯 또는 버킷 행이 소유권을 가지며, 저장되거나 드롭되면 소멸합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// 수신 시각 (unix 초)
    pub received_at: i64,
    /// 송신자 IPv4 주소 (점 표기)
    pub source_host: String,
    /// 원시 페이로드
    pub message: String,
}

impl LogRecord {
    /// 새 레코드를 생성합니다.
    pub fn new(received_at: i64, source_host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            received_at,
            source_host: source_host.into(),
            message: message.into(),
        }
    }

    /// 데이터그램 페이로드와 송신자 주소로부터 레코드를 생성합니다.
    ///
    /// 페이로드는 구조 해석 없이 그대로 텍스트로 저장됩니다.
    /// UTF-8이 아닌 바이트는 대체 문자로 치환됩니다.
    pub fn from_datagram(received_at: i64, peer: SocketAddr, payload: &[u8]) -> Self {
        Self {
            received_at,
            source_host: host_text(peer.ip()),
            message: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

/// 송신자 주소를 점 표기 IPv4 텍스트로 변환합니다.
///
/// IPv4-mapped IPv6 주소는 IPv4로 풀어서 표기합니다.
pub fn host_text(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
    }
}
