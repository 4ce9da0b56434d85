// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Arc, Mutex};

/// Destination for the append-only structured audit log: one canonical JSON
/// envelope line per invocation, in trace order.
///
/// Implementations must be append-only; the pipeline never rewrites or
/// deletes a line once written.
pub trait AuditSink: Send + Sync {
    /// Append a single encoded envelope line.
    fn append(&self, line: String);
}

/// An [`AuditSink`] that keeps every line in memory, for tests and
/// short-lived processes.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl InMemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines appended so far, in append order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("audit sink lock poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&self, line: String) {
        self.lines.lock().expect("audit sink lock poisoned").push(line);
    }
}
