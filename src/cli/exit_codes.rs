//! CLI Exit Codes
//!
//! Stable exit codes so scripts can tell session failures apart.

use crate::config::ConfigError;
use crate::core::session::SessionError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// No data within the idle timeout
    pub const TIMEOUT: u8 = 4;

    /// Login not accepted
    pub const LOGIN_FAILED: u8 = 5;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 6;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Channel closed or misbehaved mid-exchange
    pub const PROTOCOL_ERROR: u8 = 9;

    /// User cancelled
    pub const CANCELLED: u8 = 11;
}

const ALL_CODES: [u8; 11] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 11];

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success
    Success,

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Successful run
    pub fn success() -> Self {
        Self::Success
    }

    /// Failed run with exit `code`
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Error message, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Error(_, msg) => Some(msg),
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

fn io_code(err: &std::io::Error) -> u8 {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => ExitCodes::FILE_NOT_FOUND,
        ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
        ErrorKind::ConnectionRefused => ExitCodes::CONNECTION_FAILED,
        ErrorKind::TimedOut => ExitCodes::TIMEOUT,
        _ => ExitCodes::ERROR,
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        Self::error(io_code(&err), err.to_string())
    }
}

impl From<&SessionError> for CliResult {
    fn from(err: &SessionError) -> Self {
        let code = match err {
            SessionError::ConnectionFailed(_) => ExitCodes::CONNECTION_FAILED,
            SessionError::LoginFailed(_) => ExitCodes::LOGIN_FAILED,
            SessionError::ProtocolDesync { .. } | SessionError::Channel { .. } => {
                ExitCodes::PROTOCOL_ERROR
            }
            SessionError::FileAccess { source, .. } => io_code(source),
            SessionError::InvalidCommand(_) => ExitCodes::INVALID_ARGS,
            SessionError::Cancelled => ExitCodes::CANCELLED,
            SessionError::Timeout(_) => ExitCodes::TIMEOUT,
        };
        Self::error(code, err.to_string())
    }
}

impl From<&ConfigError> for CliResult {
    fn from(err: &ConfigError) -> Self {
        Self::error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

impl From<&anyhow::Error> for CliResult {
    /// Use the code of the first known error in the chain
    fn from(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(session) = cause.downcast_ref::<SessionError>() {
                return Self::error(Self::from(session).code(), format!("{err:#}"));
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::error(ExitCodes::CONFIG_ERROR, format!("{err:#}"));
            }
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                return Self::error(io_code(io), format!("{err:#}"));
            }
        }
        Self::error(ExitCodes::ERROR, format!("{err:#}"))
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Timed out waiting for data",
        5 => "Login failed",
        6 => "File not found",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Protocol error",
        11 => "Operation cancelled",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ALL_CODES {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}
