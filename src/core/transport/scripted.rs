//! Scripted in-memory transport for tests
//!
//! Plays back a fixed conversation: bytes the controller sends and bytes the
//! client is expected to write, in order. Reading while a write is expected
//! (or after the script ran out) behaves like the peer closing the stream;
//! reading at a [`Step::Stall`] waits forever.

use super::{TransportError, TransportStats, TransportTrait};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// One step of a scripted conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Bytes the controller sends once the earlier steps are done
    Read(Vec<u8>),
    /// Bytes already sitting in the receive buffer, dropped by `discard_pending`
    Pending(Vec<u8>),
    /// Bytes the client must write next
    Write(Vec<u8>),
    /// Peer stays connected but never sends again
    Stall,
    /// The connection breaks with an I/O error
    Broken,
}

impl Step {
    pub(crate) fn read(bytes: impl AsRef<[u8]>) -> Self {
        Self::Read(bytes.as_ref().to_vec())
    }

    pub(crate) fn pending(bytes: impl AsRef<[u8]>) -> Self {
        Self::Pending(bytes.as_ref().to_vec())
    }

    pub(crate) fn write(bytes: impl AsRef<[u8]>) -> Self {
        Self::Write(bytes.as_ref().to_vec())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    written: Vec<u8>,
    connects: usize,
    disconnects: usize,
    discarded: usize,
}

/// Shared view of a [`ScriptedTransport`] for assertions after it has been
/// moved into an engine
#[derive(Debug, Clone)]
pub(crate) struct ScriptHandle(Arc<Mutex<ScriptState>>);

impl ScriptHandle {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.0.lock().written.clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.0.lock().connects
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.0.lock().disconnects
    }

    pub(crate) fn discarded(&self) -> usize {
        self.0.lock().discarded
    }

    pub(crate) fn remaining(&self) -> Vec<Step> {
        self.0.lock().steps.iter().cloned().collect()
    }

    pub(crate) fn assert_finished(&self) {
        let remaining = self.remaining();
        assert!(remaining.is_empty(), "unconsumed script steps: {:02X?}", remaining);
    }
}

pub(crate) struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    connected: bool,
    refuse_connect: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>) -> (Self, ScriptHandle) {
        let state = Arc::new(Mutex::new(ScriptState {
            steps: steps.into(),
            ..ScriptState::default()
        }));
        let transport = Self {
            state: state.clone(),
            connected: false,
            refuse_connect: false,
        };
        (transport, ScriptHandle(state))
    }

    /// A transport whose `connect` always fails
    pub(crate) fn refusing() -> (Self, ScriptHandle) {
        let (mut transport, handle) = Self::new(Vec::new());
        transport.refuse_connect = true;
        (transport, handle)
    }

    /// Next scripted byte, or `None` when the script stalls here
    fn next_byte(&self) -> Option<Result<u8, TransportError>> {
        let mut state = self.state.lock();
        loop {
            match state.steps.front_mut() {
                Some(Step::Read(bytes) | Step::Pending(bytes)) => {
                    if !bytes.is_empty() {
                        let byte = bytes.remove(0);
                        if bytes.is_empty() {
                            state.steps.pop_front();
                        }
                        return Some(Ok(byte));
                    }
                }
                Some(Step::Stall) => return None,
                Some(Step::Broken) => {
                    let err = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
                    return Some(Err(TransportError::IoError(err)));
                }
                // Peer is waiting for us; nothing more will arrive
                Some(Step::Write(_)) | None => return Some(Err(TransportError::Disconnected)),
            }
            state.steps.pop_front();
        }
    }

    /// A transport that is already connected, for reader-level tests
    pub(crate) fn connected(steps: Vec<Step>) -> (Self, ScriptHandle) {
        let (mut transport, handle) = Self::new(steps);
        transport.connected = true;
        (transport, handle)
    }
}

#[async_trait]
impl TransportTrait for ScriptedTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.refuse_connect {
            return Err(TransportError::ConnectionFailed("connection refused".to_string()));
        }
        self.state.lock().connects += 1;
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            self.state.lock().disconnects += 1;
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        let mut state = self.state.lock();
        state.written.extend_from_slice(data);

        while matches!(
            state.steps.front(),
            Some(Step::Read(b) | Step::Pending(b)) if b.is_empty()
        ) {
            state.steps.pop_front();
        }

        let mut rest = data;
        while !rest.is_empty() {
            let expected = match state.steps.front_mut() {
                Some(Step::Write(expected)) => expected,
                other => panic!("unexpected write {:02X?}, next step is {:02X?}", rest, other),
            };
            let n = rest.len().min(expected.len());
            assert_eq!(
                &rest[..n],
                &expected[..n],
                "write mismatch: got {:02X?}, expected {:02X?}",
                rest,
                expected
            );
            expected.drain(..n);
            rest = &rest[n..];
            if expected.is_empty() {
                state.steps.pop_front();
            }
        }
        Ok(data.len())
    }

    async fn read_byte(&mut self) -> Result<u8, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        match self.next_byte() {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn discard_pending(&mut self) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        let mut dropped = 0;
        while let Some(Step::Pending(bytes)) = state.steps.front() {
            dropped += bytes.len();
            state.steps.pop_front();
        }
        state.discarded += dropped;
        Ok(dropped)
    }

    fn connection_info(&self) -> String {
        "scripted://".to_string()
    }

    fn stats(&self) -> TransportStats {
        let state = self.state.lock();
        TransportStats {
            bytes_sent: state.written.len() as u64,
            bytes_discarded: state.discarded as u64,
            ..TransportStats::default()
        }
    }
}
