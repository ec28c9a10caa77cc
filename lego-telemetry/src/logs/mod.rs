//! Structured logging: leveled entries buffered and flushed to sinks

mod level;
mod logger;
mod sink;

pub use level::LogLevel;
pub use logger::{LogEntry, StructuredLogger};
pub use sink::{InMemoryLogSink, JsonLinesLogSink, LogSink};
