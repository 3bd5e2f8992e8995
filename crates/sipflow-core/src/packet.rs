use std::fmt;
use std::net::SocketAddr;

/// Transport a SIP payload was captured on.
///
/// The PCAP loader only produces `Udp` and `Tcp`. The other variants are for
/// sources that see decrypted or framed payloads, such as a TLS key-logging
/// capture or a WebSocket proxy tap; they are buffered like TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl Transport {
    /// Stream transports do not preserve message boundaries.
    pub fn is_stream(self) -> bool {
        !matches!(self, Transport::Udp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Udp => "UDP",
            Transport::Tcp => "TCP",
            Transport::Tls => "TLS",
            Transport::Ws => "WS",
            Transport::Wss => "WSS",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw payload handed to the store by the capture side.
#[derive(Debug, Clone)]
pub struct Packet {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub transport: Transport,
    /// Capture time in seconds since the Unix epoch, when known.
    pub timestamp: Option<f64>,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(src: SocketAddr, dst: SocketAddr, transport: Transport, payload: Vec<u8>) -> Self {
        Self {
            src,
            dst,
            transport,
            timestamp: None,
            payload,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// `ip:port`, with brackets around IPv6 addresses.
pub fn format_endpoint(addr: &SocketAddr) -> String {
    match addr {
        SocketAddr::V4(addr) => format!("{}:{}", addr.ip(), addr.port()),
        SocketAddr::V6(addr) => format!("[{}]:{}", addr.ip(), addr.port()),
    }
}
