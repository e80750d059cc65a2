//! Log sinks for pool traffic.
//!
//! A pool writes one entry per logged message: a head of the form
//! `"[<pool-name>]: <prefix><event> :"` followed by the event arguments.

use std::fmt;
use std::sync::Mutex;

use serde_json::Value;

/// Destination for pool log entries. Return values are never consulted.
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Writes one entry.
    fn log(&self, head: &str, args: &[Value]);
}

/// Forwards entries to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, head: &str, args: &[Value]) {
        tracing::info!(target: "frame_pool", args = %render_args(args), "{head}");
    }
}

/// One captured entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Formatted head.
    pub head: String,
    /// Arguments that followed the head.
    pub args: Vec<Value>,
}

/// Keeps entries in memory; useful for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Returns the heads of all entries so far.
    #[must_use]
    pub fn heads(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.head).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, head: &str, args: &[Value]) {
        let entry = LogEntry {
            head: head.to_string(),
            args: args.to_vec(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Renders arguments space-separated, each as compact JSON.
#[must_use]
pub fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
