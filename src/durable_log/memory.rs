use super::{LogError, LogWriter};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryLogInner {
    entries: Vec<u64>,
    closed: bool,
}

/// In-memory log. Clones share the same entries, so a test can keep one
/// handle and hand the other to the worker.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    inner: Arc<Mutex<MemoryLogInner>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<u64> {
        self.inner.lock().entries.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl LogWriter for MemoryLog {
    fn append(&mut self, value: u64) -> Result<(), LogError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(LogError::Closed);
        }
        inner.entries.push(value);
        Ok(())
    }

    fn written(&self) -> u64 {
        self.inner.lock().entries.len() as u64
    }

    fn close(self: Box<Self>) -> Result<(), LogError> {
        self.inner.lock().closed = true;
        Ok(())
    }
}
