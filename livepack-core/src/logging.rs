//! Buffered log sink for host applications.
//!
//! Hosts embedding the packager through the C ABI cannot subscribe to
//! `tracing` directly, so an opt-in, process-wide sink captures warnings and
//! errors into a bounded ring buffer they can drain. Installation and
//! removal are idempotent; the buffer holds at most [`MAX_BUFFERED_RECORDS`]
//! records and drops the oldest on overflow.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Maximum number of records retained by the sink.
pub const MAX_BUFFERED_RECORDS: usize = 1000;

/// Severity of a captured log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Recoverable problem.
    Warning,
    /// Operation failed.
    Error,
    /// Unrecoverable condition.
    Fatal,
}

/// One captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Record severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

struct SinkState {
    min_severity: Severity,
    records: VecDeque<LogRecord>,
}

static SINK: Mutex<Option<SinkState>> = Mutex::new(None);

/// Install the buffered sink, capturing records at or above `min_severity`.
///
/// Installing over an existing sink replaces its threshold and keeps the
/// buffered records.
pub fn install(min_severity: Severity) {
    let mut sink = SINK.lock();
    match sink.as_mut() {
        Some(state) => state.min_severity = min_severity,
        None => {
            *sink = Some(SinkState {
                min_severity,
                records: VecDeque::new(),
            });
        }
    }
}

/// Remove the sink and discard any buffered records.
pub fn remove() {
    *SINK.lock() = None;
}

/// Drain all buffered records, oldest first.
pub fn drain() -> Vec<LogRecord> {
    let mut sink = SINK.lock();
    match sink.as_mut() {
        Some(state) => state.records.drain(..).collect(),
        None => Vec::new(),
    }
}

/// Record a message into the sink (if installed) and forward it to `tracing`.
pub fn emit(severity: Severity, message: impl Into<String>) {
    let message = message.into();

    match severity {
        Severity::Info => tracing::info!("{message}"),
        Severity::Warning => tracing::warn!("{message}"),
        Severity::Error | Severity::Fatal => tracing::error!("{message}"),
    }

    let mut sink = SINK.lock();
    if let Some(state) = sink.as_mut() {
        if severity >= state.min_severity {
            if state.records.len() == MAX_BUFFERED_RECORDS {
                state.records.pop_front();
            }
            state.records.push_back(LogRecord { severity, message });
        }
    }
}
