//! Durable storage of the visual model.
//!
//! # Responsibility
//! - `xml`: the `model.xml` document codec.
//! - `file_store`: directory layout, backups and atomic overwrite.
//!
//! # Invariants
//! - Every failure surfaces as `StoreError`; parse failures keep the
//!   underlying message.

pub mod file_store;
pub mod xml;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub use file_store::ModelFileStore;
pub use xml::{CourseDocument, ElementRecord, XmlError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence store error.
#[derive(Debug)]
pub enum StoreError {
    /// Data directory does not exist.
    DataDirMissing(PathBuf),
    /// Data directory path exists but is not a directory.
    DataDirNotADirectory(PathBuf),
    /// Model file path exists but is not a regular file.
    ModelNotAFile(PathBuf),
    /// Backup directory path exists but is not a directory.
    BackupDirNotADirectory(PathBuf),
    /// Filesystem operation failed.
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    /// Stored content could not be parsed or rendered.
    Parse { path: PathBuf, source: XmlError },
    /// Model path still exists after removal.
    RemoveIncomplete(PathBuf),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataDirMissing(path) => {
                write!(f, "data directory does not exist: {}", path.display())
            }
            Self::DataDirNotADirectory(path) => {
                write!(f, "data directory is not a directory: {}", path.display())
            }
            Self::ModelNotAFile(path) => {
                write!(f, "model file is not a regular file: {}", path.display())
            }
            Self::BackupDirNotADirectory(path) => {
                write!(f, "backup directory is not a directory: {}", path.display())
            }
            Self::Io {
                action,
                path,
                source,
            } => write!(f, "failed to {action} at {}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "exception parsing {}: {source}", path.display())
            }
            Self::RemoveIncomplete(path) => {
                write!(f, "model could not be fully removed: {}", path.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}
