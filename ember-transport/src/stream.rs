//! Byte stream trait for the transport layer

use crate::error::{EmberError, EmberResult};
use async_trait::async_trait;
use std::time::Duration;

/// Byte stream interface to a remote Ember+ peer
#[async_trait]
pub trait ByteStream: Send + Sync {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> EmberResult<()>;

    /// Read data from the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to read into
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> EmberResult<usize>;

    /// Write data to the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Data to write
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> EmberResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> EmberResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(EmberError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> EmberResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> EmberResult<()>;
}

/// Transport layer trait that extends ByteStream with connection setup
#[async_trait]
pub trait Transport: ByteStream {
    /// Open the physical layer connection
    async fn open(&mut self) -> EmberResult<()>;
}
