//! Telnet transport implementation
//!
//! Implements the client side of Telnet (RFC 854) option negotiation that the
//! controller console expects, including terminal-type subnegotiation
//! (RFC 1091).

use super::{TransportError, TransportStats, TransportTrait};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// Telnet protocol constants
const IAC: u8 = 255; // Interpret As Command
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250; // Subnegotiation Begin
const SE: u8 = 240; // Subnegotiation End

// Options
const OPT_ECHO: u8 = 1;
const OPT_SUPPRESS_GO_AHEAD: u8 = 3;
const OPT_TERMINAL_TYPE: u8 = 24;

const CR: u8 = b'\r';
const NUL: u8 = 0;

// Terminal-type subnegotiation codes
const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

/// Telnet connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelnetConfig {
    /// Host address
    pub host: String,
    /// Port number (default: 9105)
    pub port: u16,
    /// Terminal type to announce
    pub terminal_type: String,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl TelnetConfig {
    /// Create a new Telnet configuration
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: 9105,
            terminal_type: "VT100".to_string(),
            connect_timeout_secs: 10,
        }
    }

    /// Set port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set terminal type
    #[must_use]
    pub fn terminal_type(mut self, term_type: &str) -> Self {
        self.terminal_type = term_type.to_string();
        self
    }

    /// Set connection timeout
    #[must_use]
    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Data,
    /// Last data byte was CR; a NUL right after it is padding
    Cr,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Incremental Telnet decoder
///
/// Separates application data from Telnet commands. Commands may be split
/// across reads; the decoder keeps its state between calls to
/// [`decode`](Self::decode). The NUL a peer sends after a bare CR is
/// dropped.
#[derive(Debug, Clone)]
pub struct TelnetDecoder {
    terminal_type: String,
    state: DecodeState,
    sub_buffer: Vec<u8>,
    /// We have announced WILL TERMINAL-TYPE
    terminal_type_offered: bool,
}

impl TelnetDecoder {
    /// Create a decoder announcing `terminal_type`
    pub fn new(terminal_type: &str) -> Self {
        Self {
            terminal_type: terminal_type.to_string(),
            state: DecodeState::Data,
            sub_buffer: Vec::new(),
            terminal_type_offered: false,
        }
    }

    /// Forget any partially received command and negotiated option
    pub fn reset(&mut self) {
        self.state = DecodeState::Data;
        self.sub_buffer.clear();
        self.terminal_type_offered = false;
    }

    /// Unsolicited offer sent right after connecting
    pub fn offer(&mut self) -> [u8; 3] {
        self.terminal_type_offered = true;
        [IAC, WILL, OPT_TERMINAL_TYPE]
    }

    /// Decode raw bytes from the socket
    ///
    /// Application data is appended to `data`; negotiation answers that must
    /// be written back to the peer are appended to `replies`.
    pub fn decode(&mut self, raw: &[u8], data: &mut BytesMut, replies: &mut Vec<u8>) {
        for &byte in raw {
            self.state = match self.state {
                DecodeState::Cr if byte == NUL => DecodeState::Data,
                DecodeState::Data | DecodeState::Cr if byte == IAC => DecodeState::Iac,
                DecodeState::Data | DecodeState::Cr => {
                    data.extend_from_slice(&[byte]);
                    if byte == CR {
                        DecodeState::Cr
                    } else {
                        DecodeState::Data
                    }
                }
                DecodeState::Iac => match byte {
                    IAC => {
                        data.extend_from_slice(&[IAC]);
                        DecodeState::Data
                    }
                    DO | DONT | WILL | WONT => DecodeState::Negotiate(byte),
                    SB => {
                        self.sub_buffer.clear();
                        DecodeState::Sub
                    }
                    // NOP, GA and friends carry no option byte
                    _ => DecodeState::Data,
                },
                DecodeState::Negotiate(command) => {
                    self.answer_option(command, byte, replies);
                    DecodeState::Data
                }
                DecodeState::Sub if byte == IAC => DecodeState::SubIac,
                DecodeState::Sub => {
                    self.sub_buffer.push(byte);
                    DecodeState::Sub
                }
                DecodeState::SubIac => match byte {
                    SE => {
                        self.answer_subnegotiation(replies);
                        DecodeState::Data
                    }
                    IAC => {
                        self.sub_buffer.push(IAC);
                        DecodeState::Sub
                    }
                    _ => DecodeState::Sub,
                },
            };
        }
    }

    fn answer_option(&mut self, command: u8, option: u8, replies: &mut Vec<u8>) {
        let response = match command {
            // Already agreed through our offer; answering again would loop
            DO if option == OPT_TERMINAL_TYPE && self.terminal_type_offered => return,
            DO => match option {
                OPT_TERMINAL_TYPE => {
                    self.terminal_type_offered = true;
                    [IAC, WILL, option]
                }
                OPT_SUPPRESS_GO_AHEAD => [IAC, WILL, option],
                _ => [IAC, WONT, option],
            },
            DONT if option == OPT_TERMINAL_TYPE && self.terminal_type_offered => {
                self.terminal_type_offered = false;
                [IAC, WONT, option]
            }
            WILL => match option {
                OPT_ECHO | OPT_SUPPRESS_GO_AHEAD => [IAC, DO, option],
                _ => [IAC, DONT, option],
            },
            _ => return,
        };
        replies.extend_from_slice(&response);
    }

    fn answer_subnegotiation(&mut self, replies: &mut Vec<u8>) {
        if self.sub_buffer.as_slice() == [OPT_TERMINAL_TYPE, TTYPE_SEND] {
            replies.extend_from_slice(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_IS]);
            replies.extend_from_slice(self.terminal_type.as_bytes());
            replies.extend_from_slice(&[IAC, SE]);
        }
        self.sub_buffer.clear();
    }
}

/// Double every IAC byte of outgoing data
fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(data.len());
    for &byte in data {
        if byte == IAC {
            escaped.push(IAC);
        }
        escaped.push(byte);
    }
    escaped
}

/// Telnet transport
pub struct TelnetTransport {
    config: TelnetConfig,
    stream: Option<TcpStream>,
    decoder: TelnetDecoder,
    /// Decoded bytes not yet handed out by `read_byte`
    received: BytesMut,
    stats: TransportStats,
    connected_at: Option<Instant>,
}

impl TelnetTransport {
    /// Create a new Telnet transport
    pub fn new(config: TelnetConfig) -> Self {
        let decoder = TelnetDecoder::new(&config.terminal_type);
        Self {
            config,
            stream: None,
            decoder,
            received: BytesMut::with_capacity(4096),
            stats: TransportStats::default(),
            connected_at: None,
        }
    }

    /// Block until at least one decoded byte is buffered
    async fn fill(&mut self) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut buffer = [0u8; 1024];

        while self.received.is_empty() {
            let n = stream.read(&mut buffer).await?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }

            let before = self.received.len();
            let mut replies = Vec::new();
            self.decoder.decode(&buffer[..n], &mut self.received, &mut replies);
            self.stats.bytes_received += (self.received.len() - before) as u64;

            if !replies.is_empty() {
                tracing::debug!("Telnet negotiation reply: {}", hex::encode(&replies));
                stream.write_all(&replies).await?;
                stream.flush().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransportTrait for TelnetTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let secs = self.config.connect_timeout_secs;

        let mut stream = tokio::time::timeout(Duration::from_secs(secs), TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Timeout(secs))?
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", addr, e)))?;

        stream.set_nodelay(true).map_err(TransportError::IoError)?;

        self.decoder.reset();
        self.received.clear();
        self.stats = TransportStats::default();

        let offer = self.decoder.offer();
        stream.write_all(&offer).await?;
        tracing::debug!("Telnet offer: {}", hex::encode(offer));

        self.stream = Some(stream);
        self.connected_at = Some(Instant::now());

        tracing::info!("Connected to {}", self.connection_info());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.ok();
            let stats = self.stats();
            tracing::info!(
                "Disconnected from {} (sent {} bytes, received {} bytes, discarded {} bytes)",
                self.connection_info(),
                stats.bytes_sent,
                stats.bytes_received,
                stats.bytes_discarded
            );
        }
        self.connected_at = None;
        self.received.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        stream.write_all(&escape_iac(data)).await?;
        stream.flush().await?;

        self.stats.bytes_sent += data.len() as u64;
        Ok(data.len())
    }

    async fn read_byte(&mut self) -> Result<u8, TransportError> {
        if !self.received.has_remaining() {
            self.fill().await?;
        }
        Ok(self.received.get_u8())
    }

    async fn discard_pending(&mut self) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut dropped = self.received.len();
        self.received.clear();

        let mut buffer = [0u8; 1024];
        let mut replies = Vec::new();
        loop {
            match stream.try_read(&mut buffer) {
                // Peer closed; the next read reports it
                Ok(0) => break,
                Ok(n) => {
                    let mut data = BytesMut::new();
                    self.decoder.decode(&buffer[..n], &mut data, &mut replies);
                    dropped += data.len();
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TransportError::IoError(e)),
            }
        }

        if !replies.is_empty() {
            stream.write_all(&replies).await?;
            stream.flush().await?;
        }

        self.stats.bytes_received += dropped as u64;
        self.stats.bytes_discarded += dropped as u64;
        Ok(dropped)
    }

    fn connection_info(&self) -> String {
        format!("telnet://{}:{}", self.config.host, self.config.port)
    }

    fn stats(&self) -> TransportStats {
        let mut stats = self.stats.clone();
        if let Some(connected_at) = self.connected_at {
            stats.uptime_secs = connected_at.elapsed().as_secs();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(decoder: &mut TelnetDecoder, raw: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = BytesMut::new();
        let mut replies = Vec::new();
        decoder.decode(raw, &mut data, &mut replies);
        (data.to_vec(), replies)
    }

    #[test]
    fn test_plain_data_passes_through() {
        let mut decoder = TelnetDecoder::new("VT100");
        let (data, replies) = decode(&mut decoder, b"login: ");
        assert_eq!(data, b"login: ");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_negotiation_answers() {
        let mut decoder = TelnetDecoder::new("VT100");
        let (data, replies) = decode(
            &mut decoder,
            &[IAC, DO, OPT_TERMINAL_TYPE, b'a', IAC, WILL, OPT_ECHO, IAC, DO, 31],
        );
        assert_eq!(data, b"a");
        assert_eq!(
            replies,
            vec![IAC, WILL, OPT_TERMINAL_TYPE, IAC, DO, OPT_ECHO, IAC, WONT, 31]
        );
    }

    #[test]
    fn test_terminal_type_subnegotiation_split_across_reads() {
        let mut decoder = TelnetDecoder::new("VT100");
        let (_, replies) = decode(&mut decoder, &[IAC, SB, OPT_TERMINAL_TYPE]);
        assert!(replies.is_empty());

        let (data, replies) = decode(&mut decoder, &[TTYPE_SEND, IAC, SE, b'>']);
        assert_eq!(data, b">");

        let mut expected = vec![IAC, SB, OPT_TERMINAL_TYPE, TTYPE_IS];
        expected.extend_from_slice(b"VT100");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(replies, expected);
    }

    #[test]
    fn test_escaped_iac() {
        let mut decoder = TelnetDecoder::new("VT100");
        let (data, _) = decode(&mut decoder, &[0x41, IAC]);
        assert_eq!(data, vec![0x41]);
        let (data, _) = decode(&mut decoder, &[IAC, 0x42]);
        assert_eq!(data, vec![IAC, 0x42]);

        assert_eq!(escape_iac(&[0x01, IAC, 0x02]), vec![0x01, IAC, IAC, 0x02]);
    }

    #[test]
    fn test_nul_after_cr_is_dropped() {
        let mut decoder = TelnetDecoder::new("VT100");
        let (data, _) = decode(&mut decoder, b"ok\r\0>");
        assert_eq!(data, b"ok\r>");

        // Split across reads, and only directly after CR
        let (data, _) = decode(&mut decoder, b"a\r");
        assert_eq!(data, b"a\r");
        let (data, _) = decode(&mut decoder, b"\0b\0\r\n");
        assert_eq!(data, b"b\0\r\n");
    }

    #[test]
    fn test_offered_terminal_type_is_not_offered_twice() {
        let mut decoder = TelnetDecoder::new("VT100");
        assert_eq!(decoder.offer(), [IAC, WILL, OPT_TERMINAL_TYPE]);

        let (_, replies) = decode(&mut decoder, &[IAC, DO, OPT_TERMINAL_TYPE]);
        assert!(replies.is_empty());

        let (_, replies) = decode(&mut decoder, &[IAC, DONT, OPT_TERMINAL_TYPE]);
        assert_eq!(replies, vec![IAC, WONT, OPT_TERMINAL_TYPE]);

        decoder.reset();
        let (_, replies) = decode(&mut decoder, &[IAC, DO, OPT_TERMINAL_TYPE]);
        assert_eq!(replies, vec![IAC, WILL, OPT_TERMINAL_TYPE]);
    }

    #[tokio::test]
    async fn test_read_without_connection() {
        let mut transport = TelnetTransport::new(TelnetConfig::default());
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.read_byte().await,
            Err(TransportError::NotConnected)
        ));
        assert_eq!(transport.connection_info(), "telnet://localhost:9105");
    }
}
