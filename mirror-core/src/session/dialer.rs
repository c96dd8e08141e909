//! Socket connector for the forwarded port.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A bidirectional byte stream.
pub trait MirrorStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> MirrorStream for T {}

pub type BoxedStream = Box<dyn MirrorStream>;

/// Opens a fresh connection to the forwarded port on every call.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn connect(&self, port: u16) -> io::Result<BoxedStream>;
}

/// Connects over loopback TCP with `TCP_NODELAY` set.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    host: IpAddr,
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(host: IpAddr, timeout: Duration) -> Self {
        Self { host, timeout }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(2))
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn connect(&self, port: u16) -> io::Result<BoxedStream> {
        let addr = SocketAddr::new(self.host, port);
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("connect to {addr} timed out")))??;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
