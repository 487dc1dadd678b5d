//! TCP transport implementation

use crate::error::{EmberError, EmberResult};
use crate::stream::{ByteStream, Transport};
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream").finish()
    }
}

impl Deref for DebugTcpStream {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugTcpStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// TCP transport settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout: Some(timeout),
        }
    }
}

/// TCP transport implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport for an outgoing consumer connection
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> EmberResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| EmberError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    /// Create TCP transport from an already-connected TcpStream (for
    /// provider/server use)
    ///
    /// # Arguments
    /// * `stream` - The already-connected TCP stream
    /// * `timeout` - Optional read/write timeout
    pub fn from_connected_stream(stream: TcpStream, timeout: Option<Duration>) -> Self {
        Self {
            stream: Some(DebugTcpStream(stream)),
            settings: TcpSettings {
                address: SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0),
                timeout,
            },
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> EmberResult<()> {
        if !self.closed {
            return Err(EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        // Apply timeout to connection establishment if specified
        let stream = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, TcpStream::connect(self.settings.address))
                .await
                .map_err(|_| EmberError::Timeout)?
                .map_err(EmberError::Connection)?
        } else {
            TcpStream::connect(self.settings.address)
                .await
                .map_err(EmberError::Connection)?
        };

        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl ByteStream for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> EmberResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> EmberResult<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })?;

        let result = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| EmberError::Timeout)?
                .map_err(EmberError::Connection)
        } else {
            stream.read(buf).await.map_err(EmberError::Connection)
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> EmberResult<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })?;

        if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| EmberError::Timeout)?
                .map_err(EmberError::Connection)
        } else {
            stream.write(buf).await.map_err(EmberError::Connection)
        }
    }

    async fn flush(&mut self) -> EmberResult<()> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })?;

        stream.flush().await.map_err(EmberError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> EmberResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_settings() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let settings = TcpSettings::new(addr);
        assert_eq!(settings.address, addr);
        assert!(settings.timeout.is_some());
    }

    #[tokio::test]
    async fn test_loopback_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = TcpTransport::from_connected_stream(stream, None);
            let mut buf = [0u8; 4];
            let n = transport.read(&mut buf).await.unwrap();
            transport.write_all(&buf[..n]).await.unwrap();
            transport.flush().await.unwrap();
        });

        let mut client = TcpTransport::new(TcpSettings::new(addr));
        client.open().await.unwrap();
        client.write_all(&[0xFE, 0x00, 0x0E, 0xFF]).await.unwrap();
        client.flush().await.unwrap();

        let mut echo = [0u8; 4];
        let n = client.read(&mut echo).await.unwrap();
        assert_eq!(&echo[..n], &[0xFE, 0x00, 0x0E, 0xFF]);

        client.close().await.unwrap();
        assert!(client.is_closed());
        server.await.unwrap();
    }
}
