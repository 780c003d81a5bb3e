//! Per-invocation tool state: the pending message queue and the stop flag.
//!
//! One `ToolState` exists per tool invocation. The event-ingestion path
//! appends to the queue; exactly one drain task consumes it. The stop flag
//! is the cooperative cancellation signal set on completion: the drain task
//! observes it at its next poll and discards whatever is still queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub struct ToolState {
    invocation_id: String,
    tool_name: String,
    started_at: chrono::DateTime<chrono::Utc>,
    stopped: AtomicBool,
    drain_running: AtomicBool,
    queue: Mutex<VecDeque<String>>,
    last_spoken_at: Mutex<Option<Instant>>,
}

impl ToolState {
    pub fn new(invocation_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            started_at: chrono::Utc::now(),
            stopped: AtomicBool::new(false),
            drain_running: AtomicBool::new(false),
            queue: Mutex::new(VecDeque::new()),
            last_spoken_at: Mutex::new(None),
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    /// Append a message to the pending queue (Emit path)
    pub fn enqueue(&self, message: impl Into<String>) {
        self.queue.lock().unwrap().push_back(message.into());
    }

    /// Merge path: replace the pending tail when the new message strictly
    /// supersedes it, otherwise append. Never reorders.
    pub fn coalesce(&self, message: &str) {
        let mut q = self.queue.lock().unwrap();
        if let Some(tail) = q.back_mut() {
            if supersedes(message, tail) {
                *tail = message.to_string();
                return;
            }
        }
        q.push_back(message.to_string());
    }

    pub fn pop_front(&self) -> Option<String> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Drop everything still queued; returns how many messages were discarded
    pub fn discard_pending(&self) -> usize {
        let mut q = self.queue.lock().unwrap();
        let n = q.len();
        q.clear();
        n
    }

    /// Set the stop flag. Returns true only for the call that made the
    /// transition, so duplicate completions are a no-op.
    pub fn request_stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Claim the single drain-consumer slot. Returns true for the caller
    /// that should spawn the drain task.
    pub fn try_begin_drain(&self) -> bool {
        self.drain_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn mark_spoken(&self) {
        *self.last_spoken_at.lock().unwrap() = Some(Instant::now());
    }

    pub fn since_last_spoken(&self) -> Option<Duration> {
        self.last_spoken_at.lock().unwrap().map(|at| at.elapsed())
    }
}

/// A message supersedes the pending tail when it carries at least the same
/// information: normalized-equal, or an extension of the tail (typical for
/// "processed 10 rows" -> "processed 10 rows, aggregating").
fn supersedes(new: &str, old: &str) -> bool {
    let n = crate::history::normalize(new);
    let o = crate::history::normalize(old);
    n == o || n.starts_with(&o)
}
