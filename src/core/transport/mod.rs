//! Transport layer for the controller console
//!
//! The session engine only needs a byte pipe: connect, read one byte, write,
//! close. [`TransportTrait`] is that pipe; [`TelnetTransport`] is the real
//! implementation used against a controller.

mod telnet;

#[cfg(test)]
pub(crate) mod scripted;

pub use telnet::{TelnetConfig, TelnetDecoder, TelnetTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Peer closed the stream
    #[error("Disconnected")]
    Disconnected,
}

/// Transport statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received (after Telnet commands are stripped)
    pub bytes_received: u64,
    /// Bytes thrown away by [`TransportTrait::discard_pending`]
    pub bytes_discarded: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// Byte-stream transport to the controller
#[async_trait]
pub trait TransportTrait: Send {
    /// Connect to the target
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Disconnect from the target
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Write all of `data` and flush
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read the next byte, waiting for it as long as it takes
    ///
    /// Returns [`TransportError::Disconnected`] once the peer has closed the
    /// stream.
    async fn read_byte(&mut self) -> Result<u8, TransportError>;

    /// Drop whatever has been received but not yet read, without waiting
    ///
    /// Returns the number of bytes dropped.
    async fn discard_pending(&mut self) -> Result<usize, TransportError>;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}
