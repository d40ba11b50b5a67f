//! # Asterm Core Library
//!
//! Console session engine for Kawasaki AS robot controllers:
//! - Telnet transport with terminal-type negotiation
//! - Prompt-driven command/response exchange
//! - Program transfer sub-protocol (`save` / `load`)
//! - TOML configuration
//! - CLI exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use asterm_core::{FsProgramStore, Session, SessionConfig, TelnetConfig, TelnetTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = TelnetTransport::new(TelnetConfig::new("192.168.0.2"));
//!     let mut session = Session::new(
//!         Box::new(transport),
//!         Box::new(FsProgramStore::new(".")),
//!         SessionConfig::default(),
//!     );
//!
//!     for response in session.send(&["where", "save main.as"]).await? {
//!         println!("{}", response.text());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{AppConfig, ControllerConfig};
pub use crate::core::command::{Command, LineEnding};
pub use crate::core::matcher::{TerminatorMatcher, TerminatorSet};
pub use crate::core::reader::{ReadError, ScanResult, StreamReader};
pub use crate::core::session::{Response, Session, SessionConfig, SessionError, SessionState};
pub use crate::core::store::{FsProgramStore, ProgramStore};
pub use crate::core::transfer::{Frame, LoadSummary, SavedProgram, TransferError};
pub use crate::core::transport::{
    TelnetConfig, TelnetTransport, TransportError, TransportStats, TransportTrait,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
