//! Terminator-driven reads over the controller channel
//!
//! [`StreamReader`] borrows the transport for the duration of one exchange
//! and is the only thing that touches it while it lives, so reads and writes
//! can never interleave with another caller.

use super::command::LineEnding;
use super::matcher::{MatcherError, TerminatorMatcher, TerminatorSet};
use super::transport::{TransportError, TransportTrait};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Read errors
#[derive(Error, Debug)]
pub enum ReadError {
    /// Transport failure, including the peer closing the stream
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The cancellation token fired while waiting for a byte
    #[error("Read cancelled")]
    Cancelled,

    /// No byte arrived within the idle timeout
    #[error("No data received for {0:?}")]
    IdleTimeout(Duration),

    /// Invalid terminator
    #[error(transparent)]
    Terminator(#[from] MatcherError),
}

impl ReadError {
    /// True when the peer closed the stream before the expected terminator
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Disconnected))
    }
}

/// Outcome of a multi-terminator scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Bytes read before the terminator
    pub payload: Vec<u8>,
    /// Index of the terminator that matched
    pub index: usize,
}

/// Reads and writes one controller channel
pub struct StreamReader<'a> {
    transport: &'a mut dyn TransportTrait,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
    line_ending: LineEnding,
}

impl<'a> StreamReader<'a> {
    /// Wrap a connected transport
    pub fn new(transport: &'a mut dyn TransportTrait, cancel: CancellationToken) -> Self {
        Self {
            transport,
            cancel,
            idle_timeout: None,
            line_ending: LineEnding::default(),
        }
    }

    /// Give up when no byte arrives within `timeout`
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Line ending appended by [`write_line`](Self::write_line)
    #[must_use]
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Read a single byte, honouring cancellation and the idle timeout
    pub async fn read_byte(&mut self) -> Result<u8, ReadError> {
        let transport = &mut *self.transport;
        let idle_timeout = self.idle_timeout;
        let read = async move {
            match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, transport.read_byte())
                    .await
                    .map_err(|_| ReadError::IdleTimeout(limit))?
                    .map_err(ReadError::from),
                None => transport.read_byte().await.map_err(ReadError::from),
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ReadError::Cancelled),
            result = read => result,
        }
    }

    /// Read until `terminator`, returning the bytes before it
    pub async fn read_until(&mut self, terminator: &[u8]) -> Result<Vec<u8>, ReadError> {
        let set = TerminatorSet::single(terminator)?;
        Ok(self.read_until_any(&set).await?.payload)
    }

    /// Read until any terminator of `set` completes
    ///
    /// The payload excludes the matched terminator's bytes; everything else
    /// read, including false starts of other terminators, is kept.
    pub async fn read_until_any(&mut self, set: &TerminatorSet) -> Result<ScanResult, ReadError> {
        let mut matcher = TerminatorMatcher::new(set);
        let mut consumed = Vec::new();

        loop {
            let byte = self.read_byte().await?;
            consumed.push(byte);
            if let Some(index) = matcher.feed(byte) {
                let terminator_len = set.get(index).map_or(0, <[u8]>::len);
                consumed.truncate(consumed.len() - terminator_len);
                return Ok(ScanResult {
                    payload: consumed,
                    index,
                });
            }
        }
    }

    /// Discard everything up to and including `terminator`
    ///
    /// Returns the number of bytes consumed, terminator included.
    pub async fn skip_until(&mut self, terminator: &[u8]) -> Result<usize, ReadError> {
        let payload = self.read_until(terminator).await?;
        Ok(payload.len() + terminator.len())
    }

    /// Drop bytes that arrived but were never read
    pub async fn discard_pending(&mut self) -> Result<usize, ReadError> {
        Ok(self.transport.discard_pending().await?)
    }

    /// Write raw bytes
    pub async fn write(&mut self, data: &[u8]) -> Result<(), ReadError> {
        self.transport.send(data).await?;
        Ok(())
    }

    /// Write a text line followed by the configured line ending
    pub async fn write_line(&mut self, line: &str) -> Result<(), ReadError> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.bytes());
        self.write(&data).await
    }
}
