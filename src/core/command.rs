//! Console command classification
//!
//! The engine is transparent to the AS language; it only needs to know
//! whether a line starts a program transfer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Line ending type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Carriage Return only
    Cr,
    /// Line Feed only
    Lf,
    /// Both CR and LF
    #[default]
    CrLf,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

/// Command parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// `load` needs exactly one file name
    #[error("load expects exactly one file name, got {0}")]
    LoadArguments(usize),
}

/// A console command, classified by its prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Anything that is answered with text up to the next prompt
    Plain(String),
    /// Upload a program from the controller
    Save(String),
    /// Download a local file to the controller
    Load {
        /// Full command line as typed
        line: String,
        /// File to send
        file: String,
    },
}

impl Command {
    /// Classify a command line
    ///
    /// Prefixes are matched case-insensitively, so `SAVE` and `saveall` are
    /// both transfers.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if has_prefix(line, "save") {
            return Ok(Self::Save(line.to_string()));
        }

        if has_prefix(line, "load") {
            let args: Vec<&str> = line.split_whitespace().skip(1).collect();
            return match args.as_slice() {
                [file] => Ok(Self::Load {
                    line: line.to_string(),
                    file: (*file).to_string(),
                }),
                _ => Err(CommandError::LoadArguments(args.len())),
            };
        }

        Ok(Self::Plain(line.to_string()))
    }

    /// The line written to the console
    pub fn line(&self) -> &str {
        match self {
            Self::Plain(line) | Self::Save(line) => line,
            Self::Load { line, .. } => line,
        }
    }
}

fn has_prefix(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_commands() {
        assert_eq!(Command::parse("where").unwrap(), Command::Plain("where".into()));
        assert_eq!(Command::parse("").unwrap(), Command::Plain(String::new()));
        assert_eq!(Command::parse("list /r").unwrap(), Command::Plain("list /r".into()));
    }

    #[test]
    fn test_save_is_case_insensitive() {
        assert_eq!(Command::parse("SAVE/P prog").unwrap(), Command::Save("SAVE/P prog".into()));
        assert_eq!(Command::parse("Save").unwrap(), Command::Save("Save".into()));
    }

    #[test]
    fn test_load_takes_one_file() {
        assert_eq!(
            Command::parse("load  foo.as ").unwrap(),
            Command::Load {
                line: "load  foo.as ".into(),
                file: "foo.as".into()
            }
        );
        assert_eq!(Command::parse("load"), Err(CommandError::LoadArguments(0)));
        assert_eq!(Command::parse("LOAD a b"), Err(CommandError::LoadArguments(2)));
    }

    #[test]
    fn test_multibyte_prefix_does_not_panic() {
        assert_eq!(Command::parse("zé").unwrap(), Command::Plain("zé".into()));
        assert_eq!(Command::parse("lé").unwrap(), Command::Plain("lé".into()));
    }

    #[test]
    fn test_line_endings() {
        assert_eq!(LineEnding::default().bytes(), b"\r\n");
        assert_eq!(LineEnding::Lf.bytes(), b"\n");
    }
}
