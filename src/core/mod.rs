//! Core module containing the console session engine
//!
//! This module provides:
//! - Transport layer (Telnet) behind a byte-stream trait
//! - Streaming terminator matcher and the reader built on it
//! - Program transfer framing (save/load)
//! - Session engine with login, command dispatch and per-batch lifecycle
//! - Local program storage

pub mod command;
pub mod matcher;
pub mod reader;
pub mod session;
pub mod store;
pub mod transfer;
pub mod transport;
