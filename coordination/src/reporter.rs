//! Scoped per-task reporter.
//!
//! Replaces the "ambient singleton log façade" pattern flagged in §9 —
//! the distilled spec's original `log` module is a process-wide
//! singleton carrying mutable indent/phase/buffer state. Here it's an
//! explicit object constructed once per task and threaded into every
//! component that needs to report progress, wrapping `tracing` macros
//! (the substrate both this and the teacher emit through) rather than
//! printing directly.
//!
//! The "raw response -> interpretation" consolidation buffer described
//! in §9 is modeled as a small state machine with a debounced flush: a
//! pending raw chunk accumulates until either a new interpretation
//! arrives or `flush_after` elapses, then is emitted as a single log
//! line. This mirrors a producer that wants to coalesce bursty
//! streaming tokens into one readable line instead of one per token.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::session::AgentRole;

/// Default coalescing window for raw-response buffering.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct ReportBuffer {
    pending_raw: String,
    last_update: Option<Instant>,
}

/// Scoped reporter for a single task. Cheap to clone (wraps an `Arc`
/// internally via `tokio::sync::Mutex` over a small buffer) so it can be
/// handed to every agent runner and the orchestrator loop alike.
pub struct Reporter {
    task_id: String,
    flush_after: Duration,
    buffer: Mutex<ReportBuffer>,
}

impl Reporter {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            flush_after: DEFAULT_FLUSH_INTERVAL,
            buffer: Mutex::new(ReportBuffer::default()),
        }
    }

    pub fn with_flush_interval(mut self, flush_after: Duration) -> Self {
        self.flush_after = flush_after;
        self
    }

    pub fn phase(&self, role: AgentRole, message: &str) {
        info!(task_id = %self.task_id, agent = ?role, "{message}");
    }

    pub fn tool_status(&self, role: AgentRole, tool: &str, detail: &str) {
        info!(task_id = %self.task_id, agent = ?role, tool, "{detail}");
    }

    pub fn error(&self, role: AgentRole, message: &str) {
        warn!(task_id = %self.task_id, agent = ?role, "{message}");
    }

    /// Appends a chunk of raw streaming output to the coalescing
    /// buffer. Call `maybe_flush` (or `flush`) to decide whether the
    /// accumulated buffer is due for emission.
    pub async fn push_raw(&self, chunk: &str) {
        let mut buf = self.buffer.lock().await;
        buf.pending_raw.push_str(chunk);
        buf.last_update = Some(Instant::now());
    }

    /// Flushes the buffer immediately, regardless of elapsed time, and
    /// returns the flushed content (if any). Used when an interpreted
    /// verdict arrives and supersedes the raw buffer.
    pub async fn flush(&self) -> Option<String> {
        let mut buf = self.buffer.lock().await;
        if buf.pending_raw.is_empty() {
            return None;
        }
        let content = std::mem::take(&mut buf.pending_raw);
        buf.last_update = None;
        Some(content)
    }

    /// Flushes only if `flush_after` has elapsed since the last push.
    /// Intended to be polled from a timer tick in the orchestrator loop.
    pub async fn maybe_flush(&self) -> Option<String> {
        let due = {
            let buf = self.buffer.lock().await;
            match buf.last_update {
                Some(last) => last.elapsed() >= self.flush_after,
                None => false,
            }
        };
        if due {
            self.flush().await
        } else {
            None
        }
    }
}
