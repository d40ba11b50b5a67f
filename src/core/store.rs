//! Local program storage
//!
//! `load` reads a program through a [`ProgramStore`]; the CLI writes saved
//! programs through the same store.

use std::io;
use std::path::{Path, PathBuf};

/// Where program files live
#[cfg_attr(test, mockall::automock)]
pub trait ProgramStore: Send + Sync {
    /// Read the raw bytes of a program file
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Write a program file, replacing any existing one
    fn write(&self, name: &str, content: &[u8]) -> io::Result<()>;
}

/// File-system store, resolving relative names against a root directory
#[derive(Debug, Clone)]
pub struct FsProgramStore {
    root: PathBuf,
}

impl FsProgramStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path for `name`; absolute names are used as they are
    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for FsProgramStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ProgramStore for FsProgramStore {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(name);
        tracing::debug!("Reading program file {}", path.display());
        std::fs::read(path)
    }

    fn write(&self, name: &str, content: &[u8]) -> io::Result<()> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!("Writing {} bytes to {}", content.len(), path.display());
        std::fs::write(path, content)
    }
}
