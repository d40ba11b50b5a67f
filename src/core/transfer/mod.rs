//! Program transfer sub-protocol
//!
//! Drives the framed exchange the console switches into after a `save` or
//! `load` command has been written:
//!
//! - [`save`]: the controller streams a program to us
//! - [`load`]: we stream a program to the controller in 512 byte chunks
//!
//! Both finish by consuming the controller's trailer up to the next prompt, so
//! the channel is back in command mode when they return.

pub mod frame;

pub use frame::{split_chunks, Frame, FrameError, CHUNK_SIZE};

use crate::core::matcher::TerminatorSet;
use crate::core::reader::{ReadError, StreamReader};
use bytes::Bytes;
use frame::{
    CHUNK_READY, CONFIRM_PROMPT, CONFIRM_YES, ETB, LOAD_COMPLETE, MESSAGE_END, PROMPT, TAG_END,
};
use thiserror::Error;

/// Transfer errors
#[derive(Error, Debug)]
pub enum TransferError {
    /// Reading or writing the channel failed while in `stage`
    #[error("Transfer failed during {stage}: {source}")]
    Channel {
        /// Protocol step that was running
        stage: &'static str,
        /// Underlying failure
        #[source]
        source: ReadError,
    },
}

impl TransferError {
    /// Protocol step that was running
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Channel { stage, .. } => stage,
        }
    }

    /// Underlying read failure
    pub fn read_error(&self) -> &ReadError {
        match self {
            Self::Channel { source, .. } => source,
        }
    }

    /// Unwrap into the underlying read failure
    pub fn into_read_error(self) -> ReadError {
        match self {
            Self::Channel { source, .. } => source,
        }
    }
}

trait StageExt<T> {
    fn stage(self, stage: &'static str) -> Result<T, TransferError>;
}

impl<T> StageExt<T> for Result<T, ReadError> {
    fn stage(self, stage: &'static str) -> Result<T, TransferError> {
        self.map_err(|source| TransferError::Channel { stage, source })
    }
}

/// A program received with `save`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedProgram {
    /// Concatenated data segments
    pub content: Bytes,
    /// Informational messages the controller printed along the way
    pub messages: Vec<String>,
}

/// Summary of a completed `load`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Chunk frames sent
    pub chunks: usize,
    /// Payload bytes sent
    pub bytes: usize,
    /// Confirmation prompts answered
    pub confirmations: usize,
    /// Informational messages the controller printed along the way
    pub messages: Vec<String>,
}

async fn send_frame(reader: &mut StreamReader<'_>, frame: Frame<'_>) -> Result<(), ReadError> {
    let encoded = frame.encode();
    match frame {
        Frame::Chunk(data) => tracing::debug!("Sending chunk frame ({} bytes)", data.len()),
        _ => tracing::debug!("Sending frame {}", hex::encode(&encoded)),
    }
    reader.write(&encoded).await
}

fn message_text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Receive a program after a `save` command has been written
pub async fn save(reader: &mut StreamReader<'_>) -> Result<SavedProgram, TransferError> {
    let skipped = reader.skip_until(&[ETB]).await.stage("save handshake")?;
    tracing::debug!("Skipped {} bytes before transfer start", skipped);

    send_frame(reader, Frame::StartSave).await.stage("save start")?;

    let mut content = Vec::new();
    let mut messages = Vec::new();
    loop {
        let message = reader.read_until(&MESSAGE_END).await.stage("save message")?;
        if let Some(text) = message_text(&message) {
            tracing::info!("Controller: {}", text);
            messages.push(text);
        }

        let tag = reader.read_byte().await.stage("save message")?;
        if tag == TAG_END {
            reader.read_byte().await.stage("save end")?;
            break;
        }

        let data = reader.read_until(&[ETB]).await.stage("save data")?;
        tracing::debug!("Received data segment ({} bytes)", data.len());
        content.extend_from_slice(&data);
    }

    send_frame(reader, Frame::End).await.stage("save end")?;
    let skipped = reader.skip_until(&[PROMPT]).await.stage("save trailer")?;
    tracing::debug!("Skipped {} trailer bytes", skipped);

    tracing::info!("Saved {} bytes", content.len());
    Ok(SavedProgram {
        content: Bytes::from(content),
        messages,
    })
}

/// Send `content` after a `load` command has been written
///
/// An overwrite confirmation from the controller is always answered with yes.
pub async fn load(
    reader: &mut StreamReader<'_>,
    content: &[u8],
) -> Result<LoadSummary, TransferError> {
    let skipped = reader.skip_until(&[ETB]).await.stage("load handshake")?;
    tracing::debug!("Skipped {} bytes before transfer start", skipped);

    send_frame(reader, Frame::StartLoad).await.stage("load start")?;

    let chunk_signals = TerminatorSet::new([CHUNK_READY.as_slice(), CONFIRM_PROMPT])
        .map_err(ReadError::from)
        .stage("load chunk")?;

    let mut summary = LoadSummary::default();
    for chunk in split_chunks(content) {
        loop {
            let scan = reader.read_until_any(&chunk_signals).await.stage("load chunk")?;
            if let Some(text) = message_text(&scan.payload) {
                tracing::info!("Controller: {}", text);
                summary.messages.push(text);
            }
            if scan.index == 0 {
                break;
            }
            tracing::info!("Controller asked for confirmation, answering yes");
            reader.write_line(CONFIRM_YES).await.stage("load confirmation")?;
            summary.confirmations += 1;
        }

        send_frame(reader, Frame::Chunk(chunk)).await.stage("load chunk")?;
        summary.chunks += 1;
        summary.bytes += chunk.len();
    }

    send_frame(reader, Frame::EndOfData).await.stage("load end of data")?;

    let message = reader.read_until(&LOAD_COMPLETE).await.stage("load completion")?;
    if let Some(text) = message_text(&message) {
        tracing::info!("Controller: {}", text);
        summary.messages.push(text);
    }

    send_frame(reader, Frame::End).await.stage("load end")?;
    let trailer = reader.read_until(&[PROMPT]).await.stage("load trailer")?;
    if let Some(text) = message_text(&trailer) {
        tracing::info!("Controller: {}", text);
        summary.messages.push(text);
    }

    tracing::info!("Loaded {} bytes in {} chunks", summary.bytes, summary.chunks);
    Ok(summary)
}
