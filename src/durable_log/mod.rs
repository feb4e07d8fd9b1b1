//! Durable Log - append-only record of first-seen values
//!
//! One decimal value per line, newline-terminated, flushed after every
//! append so a concurrent reader always sees a prefix of what was written.
//!
//! ## Implementations
//!
//! - `FileLog`: production (truncates on open, flush per write, sync on close)
//! - `MemoryLog`: unit tests and embedding
//! - `SimulatedLog`: deterministic write-failure injection for tests

mod file;
mod memory;
mod simulated;

pub use file::FileLog;
pub use memory::MemoryLog;
pub use simulated::{SimulatedLog, SimulatedLogConfig};

use std::io::Error as IoError;
use std::path::PathBuf;

/// Error type for durable log operations
#[derive(Debug)]
pub enum LogError {
    /// Could not create/truncate the log file
    Open { path: PathBuf, source: IoError },
    /// A single append failed
    Write { value: u64, source: IoError },
    /// Flush or sync failed while closing
    Close { path: PathBuf, source: IoError },
    /// Fault injected by `SimulatedLog`
    Injected { value: u64 },
    /// Append after close
    Closed,
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::Open { path, source } => {
                write!(f, "could not open log '{}': {}", path.display(), source)
            }
            LogError::Write { value, source } => {
                write!(f, "could not write '{}' to log: {}", value, source)
            }
            LogError::Close { path, source } => {
                write!(f, "could not close log '{}': {}", path.display(), source)
            }
            LogError::Injected { value } => write!(f, "injected write failure for '{}'", value),
            LogError::Closed => write!(f, "log already closed"),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Open { source, .. }
            | LogError::Write { source, .. }
            | LogError::Close { source, .. } => Some(source),
            LogError::Injected { .. } | LogError::Closed => None,
        }
    }
}

/// Append-only writer owned by the consume loop
pub trait LogWriter: Send {
    /// Append one value as a line. Must be visible to readers on return.
    fn append(&mut self, value: u64) -> Result<(), LogError>;
    /// Number of values successfully appended
    fn written(&self) -> u64;
    /// Flush and release the underlying resource
    fn close(self: Box<Self>) -> Result<(), LogError>;
}

/// Render a value the way it is stored: decimal digits plus `\n`
pub(crate) fn encode_line(value: u64, buf: &mut Vec<u8>) {
    buf.clear();
    buf.extend_from_slice(value.to_string().as_bytes());
    buf.push(b'\n');
}
