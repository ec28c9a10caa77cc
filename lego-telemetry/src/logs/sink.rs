//! Log sinks: destinations for flushed batches

use super::logger::LogEntry;
use crate::error::{Result, TelemetryError};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Receives batches of log entries on every flush.
///
/// A batch is a copy of the logger's buffer; sinks never see the buffer
/// itself.
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str {
        "log-sink"
    }

    fn write_batch(&self, entries: &[LogEntry]) -> Result<()>;

    /// Release resources; called once by `StructuredLogger::shutdown`
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Keeps flushed entries in memory, optionally bounded
#[derive(Debug, Default)]
pub struct InMemoryLogSink {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: Option<usize>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `capacity` entries
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogSink for InMemoryLogSink {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn write_batch(&self, batch: &[LogEntry]) -> Result<()> {
        let mut entries = self.lock();
        entries.extend(batch.iter().cloned());
        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                entries.pop_front();
            }
        }
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesLogSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesLogSink<BufWriter<File>> {
    /// Append to `path`, creating the file if needed
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesLogSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Run `f` against the underlying writer
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> LogSink for JsonLinesLogSink<W> {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn write_batch(&self, entries: &[LogEntry]) -> Result<()> {
        let mut writer = self.lock();
        for entry in entries {
            serde_json::to_writer(&mut *writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.lock()
            .flush()
            .map_err(|e| TelemetryError::sink(format!("final flush failed: {e}")))
    }
}
