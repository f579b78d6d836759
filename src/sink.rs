//! Destinations for honeypot events
//!
//! Sessions never talk to a logger directly. Everything worth keeping
//! (captured credentials, and in debug mode every received line) is
//! handed to an [`EventSink`] injected at server construction.

use std::sync::{Arc, Mutex};

/// Receives one plain-text line per honeypot event.
///
/// Called concurrently from every session task. No ordering is
/// guaranteed across sessions.
pub trait EventSink: Send + Sync {
    fn record(&self, line: &str);
}

/// `tracing` target every honeypot event is emitted on.
pub const EVENT_TARGET: &str = "mailhoney::event";

/// Forwards events to `tracing` under [`EVENT_TARGET`].
///
/// Events are always emitted. Whether they also reach the console is
/// up to the subscriber (see `logging` with the `cli` feature).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, line: &str) {
        tracing::info!(target: EVENT_TARGET, "{line}");
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn record(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
