//! Persisted last-state-change timestamps.
//!
//! The only durable artifact of the whole system: a JSON object mapping
//! site names to RFC-3339 timestamps. It exists so that "світло було
//! 3 дні" survives a process restart. Reading is infallible by design -
//! a missing or mangled file just means starting from scratch.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Result type alias for status-store operations
pub type StatusResult<T> = Result<T, StatusError>;

/// Errors that can occur while writing the status file
#[derive(Debug)]
pub enum StatusError {
    /// File could not be written or replaced
    Io(std::io::Error),

    /// The mapping could not be serialized
    Serialization(serde_json::Error),
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusError::Io(err) => write!(f, "status file I/O error: {}", err),
            StatusError::Serialization(err) => {
                write!(f, "status serialization error: {}", err)
            }
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Io(err) => Some(err),
            StatusError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StatusError {
    fn from(err: std::io::Error) -> Self {
        StatusError::Io(err)
    }
}

impl From<serde_json::Error> for StatusError {
    fn from(err: serde_json::Error) -> Self {
        StatusError::Serialization(err)
    }
}

/// File-backed store for the site → last-change mapping.
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted mapping. Never fails: a missing file is a clean
    /// start, an unreadable or corrupt one is logged and treated the same.
    pub fn load(&self) -> HashMap<String, DateTime<Utc>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no status file at {}, starting clean", self.path.display());
                return HashMap::new();
            }
            Err(e) => {
                warn!(
                    "could not read status file {}, starting clean: {e}",
                    self.path.display()
                );
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, DateTime<Utc>>>(&raw) {
            Ok(statuses) => {
                debug!("loaded status for {} sites", statuses.len());
                statuses
            }
            Err(e) => {
                warn!(
                    "corrupt status file {}, starting clean: {e}",
                    self.path.display()
                );
                HashMap::new()
            }
        }
    }

    /// Overwrite the whole file with the given mapping. Writes to a
    /// sibling temp file first so a crash mid-write cannot corrupt the
    /// previous state.
    pub fn save(&self, statuses: &HashMap<String, DateTime<Utc>>) -> StatusResult<()> {
        let json = serde_json::to_string_pretty(statuses)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("saved status for {} sites", statuses.len());
        Ok(())
    }
}
