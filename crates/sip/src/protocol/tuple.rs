use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Transport protocol of a [`Tuple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportType {
    Udp,
    Tcp,
    Tls,
    Sctp,
    Ws,
    Wss,
    #[default]
    Unknown,
}

impl TransportType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportType::Udp => "UDP",
            TransportType::Tcp => "TCP",
            TransportType::Tls => "TLS",
            TransportType::Sctp => "SCTP",
            TransportType::Ws => "WS",
            TransportType::Wss => "WSS",
            TransportType::Unknown => "UNKNOWN",
        }
    }

    /// True for transports that frame messages by Content-Length.
    pub fn is_stream(self) -> bool {
        matches!(self, TransportType::Tcp | TransportType::Tls | TransportType::Sctp)
    }
}

impl FromStr for TransportType {
    type Err = std::convert::Infallible;

    fn from_str(str: &str) -> Result<Self, Self::Err> {
        let transport = match str.to_ascii_uppercase().as_str() {
            "UDP" => TransportType::Udp,
            "TCP" => TransportType::Tcp,
            "TLS" => TransportType::Tls,
            "SCTP" => TransportType::Sctp,
            "WS" => TransportType::Ws,
            "WSS" => TransportType::Wss,
            _ => TransportType::Unknown,
        };
        Ok(transport)
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network endpoint a message came from or goes to. The message stores it
/// and hands it to decorators without interpreting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuple {
    addr: SocketAddr,
    transport: TransportType,
}

impl Default for Tuple {
    fn default() -> Self {
        Self { addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)), transport: TransportType::Unknown }
    }
}

impl Tuple {
    pub fn new(addr: SocketAddr, transport: TransportType) -> Self {
        Self { addr, transport }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn transport(&self) -> TransportType {
        self.transport
    }

    /// True when no address was ever assigned.
    pub fn is_unspecified(&self) -> bool {
        self.addr.ip().is_unspecified() && self.addr.port() == 0
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.transport, self.addr)
    }
}
