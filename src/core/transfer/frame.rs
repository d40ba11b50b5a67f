//! Program transfer framing
//!
//! Every frame the client sends has the same shape:
//!
//! ```text
//! STX  tag  ' ' ' ' ' ' ' '  seq  [payload]  ETB
//! 0x02 B/A/C/E  0x20 x4      '0'|0x1A        0x17
//! ```
//!
//! The controller answers with `ENQ STX` led signals such as `05 02 'C' 17`
//! (ready for the next chunk) and `05 02 'E' 17` (all data received).

use thiserror::Error;

/// Frame start
pub const STX: u8 = 0x02;
/// Frame end
pub const ETB: u8 = 0x17;
/// Leads controller signals, always followed by STX
pub const ENQ: u8 = 0x05;
/// "No more chunks" marker in the sequence field
pub const SUB: u8 = 0x1A;
/// Console prompt
pub const PROMPT: u8 = b'>';

/// Start of a save (controller to client)
pub const TAG_START_SAVE: u8 = b'B';
/// Start of a load (client to controller)
pub const TAG_START_LOAD: u8 = b'A';
/// Data chunk
pub const TAG_CHUNK: u8 = b'C';
/// End of transfer
pub const TAG_END: u8 = b'E';

/// Padding between tag and sequence field
pub const PADDING: [u8; 4] = [0x20; 4];
/// Sequence field of every frame except end-of-data
pub const SEQ_DEFAULT: u8 = b'0';

/// Payload bytes per load chunk
pub const CHUNK_SIZE: usize = 512;

/// Separates an informational message from what follows
pub const MESSAGE_END: [u8; 2] = [ENQ, STX];
/// Controller is ready for the next chunk
pub const CHUNK_READY: [u8; 4] = [ENQ, STX, TAG_CHUNK, ETB];
/// Controller has stored everything that was loaded
pub const LOAD_COMPLETE: [u8; 4] = [ENQ, STX, TAG_END, ETB];
/// Asked when a load would overwrite an existing program
pub const CONFIRM_PROMPT: &[u8] = b"Are you sure ? (Yes:1, No:0) \r\n";
/// Answer sent to [`CONFIRM_PROMPT`]
pub const CONFIRM_YES: &str = "1";

const HEADER_LEN: usize = 7;

/// Frame decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than the smallest frame
    #[error("Frame too short: {0} bytes")]
    TooShort(usize),

    /// First byte is not STX
    #[error("Frame does not start with STX (got 0x{0:02X})")]
    MissingStart(u8),

    /// Last byte is not ETB
    #[error("Frame does not end with ETB (got 0x{0:02X})")]
    MissingEnd(u8),

    /// Padding bytes are not spaces
    #[error("Invalid padding {0:02X?}")]
    BadPadding([u8; 4]),

    /// Tag and sequence byte do not form a known frame
    #[error("Unknown frame tag 0x{tag:02X} with sequence 0x{seq:02X}")]
    Unknown {
        /// Operation tag
        tag: u8,
        /// Sequence field
        seq: u8,
    },
}

/// A client-to-controller transfer frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Begin a save
    StartSave,
    /// Begin a load
    StartLoad,
    /// One chunk of load data
    Chunk(&'a [u8]),
    /// No more chunks
    EndOfData,
    /// Close the transfer
    End,
}

impl<'a> Frame<'a> {
    /// Operation tag byte
    pub fn tag(&self) -> u8 {
        match self {
            Self::StartSave => TAG_START_SAVE,
            Self::StartLoad => TAG_START_LOAD,
            Self::Chunk(_) | Self::EndOfData => TAG_CHUNK,
            Self::End => TAG_END,
        }
    }

    /// Sequence field byte
    pub fn sequence(&self) -> u8 {
        match self {
            Self::EndOfData => SUB,
            _ => SEQ_DEFAULT,
        }
    }

    /// Payload carried between header and ETB
    pub fn payload(&self) -> &'a [u8] {
        match self {
            Self::Chunk(data) => data,
            _ => &[],
        }
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
        out.push(STX);
        out.push(self.tag());
        out.extend_from_slice(&PADDING);
        out.push(self.sequence());
        out.extend_from_slice(payload);
        out.push(ETB);
        out
    }

    /// Decode one complete frame
    ///
    /// The payload is taken verbatim; a chunk whose data contains ETB can
    /// only be decoded when the caller already knows the frame boundary.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN + 1 {
            return Err(FrameError::TooShort(bytes.len()));
        }
        if bytes[0] != STX {
            return Err(FrameError::MissingStart(bytes[0]));
        }
        let last = bytes[bytes.len() - 1];
        if last != ETB {
            return Err(FrameError::MissingEnd(last));
        }

        let padding = [bytes[2], bytes[3], bytes[4], bytes[5]];
        if padding != PADDING {
            return Err(FrameError::BadPadding(padding));
        }

        let tag = bytes[1];
        let seq = bytes[6];
        let payload = &bytes[HEADER_LEN..bytes.len() - 1];

        match (tag, seq, payload.is_empty()) {
            (TAG_START_SAVE, SEQ_DEFAULT, true) => Ok(Self::StartSave),
            (TAG_START_LOAD, SEQ_DEFAULT, true) => Ok(Self::StartLoad),
            (TAG_CHUNK, SUB, true) => Ok(Self::EndOfData),
            (TAG_CHUNK, SEQ_DEFAULT, _) => Ok(Self::Chunk(payload)),
            (TAG_END, SEQ_DEFAULT, true) => Ok(Self::End),
            _ => Err(FrameError::Unknown { tag, seq }),
        }
    }
}

/// Split load data into chunks, in order, the last one possibly short
pub fn split_chunks(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.chunks(CHUNK_SIZE)
}
