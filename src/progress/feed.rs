//! Append-only progress feed shared between a conversion and its monitor

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only text buffer a conversion writes its progress output into
///
/// Cloning yields another handle to the same buffer. The writer side only
/// appends; readers take whole snapshots and never observe a partial append.
#[derive(Clone, Debug, Default)]
pub struct ProgressFeed {
    buffer: Arc<Mutex<String>>,
}

impl ProgressFeed {
    /// Create an empty feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text to the feed
    pub fn append(&self, text: &str) {
        self.lock().push_str(text);
    }

    /// Copy of everything appended so far
    pub fn snapshot(&self) -> String {
        self.lock().clone()
    }

    /// Last `max_chars` characters of the feed, for error reports
    pub fn tail(&self, max_chars: usize) -> String {
        let buffer = self.lock();
        let skip = buffer.chars().count().saturating_sub(max_chars);
        buffer.chars().skip(skip).collect()
    }

    // A writer that panicked mid-append still leaves valid UTF-8 behind
    fn lock(&self) -> MutexGuard<'_, String> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl io::Write for ProgressFeed {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
