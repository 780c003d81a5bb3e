//! Announcement coordinator: routes raw events through the gate, owns the
//! per-invocation queues and drain tasks, and speaks through the sink.
//!
//! One coordinator per session. Event ingestion never blocks on the
//! rephraser or the sink; it only enqueues. Each invocation gets at most
//! one drain task, which suspends on its pacing sleep, the rephrase call,
//! and the speak call, and exits cooperatively once the stop flag is set.

use crate::config::AnnounceConfig;
use crate::event::RawEvent;
use crate::gate::{Decision, Gate, InvocationView};
use crate::history::AnnouncementHistory;
use crate::rephrase::{RephraseRequest, Rephraser};
use crate::speak::SpeakSink;
use crate::state::ToolState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Session counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnounceStats {
    pub spoken: u64,
    pub dropped: u64,
    pub discarded_after_completion: u64,
}

#[derive(Default)]
struct Counters {
    spoken: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Clone)]
pub struct AnnouncementCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: AnnounceConfig,
    gate: Mutex<Gate>,
    history: Mutex<AnnouncementHistory>,
    // invocation_id -> state; completed states stay archived (stopped) so
    // late events for them are recognized as stale
    states: DashMap<String, Arc<ToolState>>,
    rephraser: Arc<dyn Rephraser>,
    sink: Arc<dyn SpeakSink>,
    last_query: Mutex<String>,
    counters: Counters,
}

impl AnnouncementCoordinator {
    pub fn new(
        cfg: AnnounceConfig,
        rephraser: Arc<dyn Rephraser>,
        sink: Arc<dyn SpeakSink>,
    ) -> Self {
        let history = AnnouncementHistory::new(cfg.dedup_window(), cfg.history_max_entries);
        let gate = Gate::new(cfg.clone());
        Self {
            inner: Arc::new(Inner {
                cfg,
                gate: Mutex::new(gate),
                history: Mutex::new(history),
                states: DashMap::new(),
                rephraser,
                sink,
                last_query: Mutex::new(String::new()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn stats(&self) -> AnnounceStats {
        AnnounceStats {
            spoken: self.inner.counters.spoken.load(Ordering::Relaxed),
            dropped: self.inner.counters.dropped.load(Ordering::Relaxed),
            discarded_after_completion: self.inner.counters.discarded.load(Ordering::Relaxed),
        }
    }

    /// Reset per-turn state. `on_event` also does this implicitly when a
    /// QueryIntent arrives with a different user query.
    pub fn begin_turn(&self) {
        self.inner.gate.lock().unwrap().begin_turn();
    }

    /// Consume events from a channel until it closes, then tear down.
    pub fn run(&self, mut rx: mpsc::Receiver<RawEvent>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                this.on_event(ev).await;
            }
            this.shutdown().await;
        })
    }

    pub async fn on_event(&self, event: RawEvent) {
        match &event {
            RawEvent::Completion { invocation_id } => {
                self.on_completion(invocation_id);
                return;
            }
            RawEvent::QueryIntent { user_query, .. } => {
                let mut last = self.inner.last_query.lock().unwrap();
                if *last != *user_query {
                    // New user query starts a new turn
                    self.inner.gate.lock().unwrap().begin_turn();
                    *last = user_query.clone();
                }
            }
            _ => {}
        }

        let view = self.view_for(&event);
        let decision = {
            let history = self.inner.history.lock().unwrap();
            self.inner.gate.lock().unwrap().accept(&event, view, &history)
        };

        match decision {
            Decision::Emit(text) => match &event {
                RawEvent::Progress {
                    invocation_id,
                    tool_name,
                    message,
                    ..
                } => {
                    self.inner
                        .history
                        .lock()
                        .unwrap()
                        .record_raw(tool_name, message);
                    let state = self.state_for(invocation_id, tool_name);
                    state.enqueue(text);
                    self.ensure_drain(&state);
                }
                _ => self.speak_single(&event, text).await,
            },
            Decision::Merge(text) => {
                if let RawEvent::Progress {
                    invocation_id,
                    tool_name,
                    message,
                    ..
                } = &event
                {
                    self.inner
                        .history
                        .lock()
                        .unwrap()
                        .record_raw(tool_name, message);
                    let state = self.state_for(invocation_id, tool_name);
                    state.coalesce(&text);
                    self.ensure_drain(&state);
                }
            }
            Decision::Drop(reason) => {
                self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "announce",
                    invocation = event.invocation_id().unwrap_or("-"),
                    ?reason,
                    "Dropped event"
                );
            }
        }
    }

    /// Set every stop flag and let drain loops exit on their next poll.
    pub async fn shutdown(&self) {
        for entry in self.inner.states.iter() {
            entry.value().request_stop();
        }
        info!(target: "announce", "Session teardown: stop flags set on all tool states");
        // Drain loops observe the flag within one pacing interval
        sleep(self.inner.cfg.pacing_interval()).await;
    }

    fn on_completion(&self, invocation_id: &str) {
        match self.inner.states.get(invocation_id) {
            Some(state) => {
                if state.request_stop() {
                    info!(
                        target: "announce",
                        invocation = %invocation_id,
                        tool = %state.tool_name(),
                        unspoken = state.pending(),
                        "Tool completed; stopping progress announcements"
                    );
                } else {
                    debug!(
                        target: "announce",
                        invocation = %invocation_id,
                        "Duplicate completion ignored"
                    );
                }
            }
            None => {
                debug!(
                    target: "announce",
                    invocation = %invocation_id,
                    "Completion for unknown invocation ignored"
                );
            }
        }
    }

    fn view_for(&self, event: &RawEvent) -> InvocationView {
        event
            .invocation_id()
            .and_then(|id| self.inner.states.get(id))
            .map(|state| InvocationView {
                stopped: state.is_stopped(),
                since_last_spoken: state.since_last_spoken(),
            })
            .unwrap_or_default()
    }

    fn state_for(&self, invocation_id: &str, tool_name: &str) -> Arc<ToolState> {
        self.inner
            .states
            .entry(invocation_id.to_string())
            .or_insert_with(|| Arc::new(ToolState::new(invocation_id, tool_name)))
            .clone()
    }

    fn ensure_drain(&self, state: &Arc<ToolState>) {
        if !state.try_begin_drain() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let state = Arc::clone(state);
        tokio::spawn(async move {
            Inner::drain_loop(inner, state).await;
        });
    }

    /// Single-shot path for query intent and tool announcements: rephrase
    /// with a canned fallback, then speak directly, bypassing the queue.
    async fn speak_single(&self, event: &RawEvent, candidate: String) {
        let inner = &self.inner;
        let (tool_key, request) = match event {
            RawEvent::QueryIntent {
                user_query,
                tools_involved,
            } => (
                "session".to_string(),
                RephraseRequest::QueryIntent {
                    user_query: user_query.clone(),
                    tools_involved: tools_involved.clone(),
                },
            ),
            RawEvent::ToolAnnounce {
                tool_name,
                description,
                arguments,
                ..
            } => {
                let avoid = inner
                    .history
                    .lock()
                    .unwrap()
                    .recent_spoken(tool_name, inner.cfg.rephrase_context_phrases);
                let user_query = inner.last_query.lock().unwrap().clone();
                (
                    tool_name.clone(),
                    RephraseRequest::ToolCall {
                        user_query,
                        tool_name: tool_name.clone(),
                        description: description.clone(),
                        arguments: arguments.clone(),
                        avoid,
                        quiet: inner.cfg.quiet_tools.contains(tool_name),
                    },
                )
            }
            _ => return,
        };

        // Without the rephraser the tool description still reads fine, but
        // echoing the user query back would not; use the canned opener.
        let plain = match &request {
            RephraseRequest::QueryIntent { .. } => request.fallback(),
            _ => candidate,
        };

        let text = if inner.cfg.enable_natural_language {
            let fallback = request.fallback();
            match timeout(inner.cfg.rephrase_timeout(), inner.rephraser.rephrase(request)).await
            {
                Ok(Ok(t)) if !t.trim().is_empty() => t,
                Ok(Ok(_)) => fallback,
                Ok(Err(e)) => {
                    warn!(target: "announce", error = %e, "Rephrase failed; using fallback phrase");
                    fallback
                }
                Err(_) => {
                    warn!(
                        target: "announce",
                        timeout_ms = inner.cfg.rephrase_timeout_ms,
                        "Rephrase timed out; using fallback phrase"
                    );
                    fallback
                }
            }
        } else {
            plain
        };

        if inner.history.lock().unwrap().heard_recently(&tool_key, &text) {
            self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(target: "announce", phrase = %text, "Suppressed verbatim repeat");
            return;
        }

        match inner.sink.speak(&text).await {
            Ok(()) => {
                inner.history.lock().unwrap().record_spoken(&tool_key, &text);
                inner.counters.spoken.fetch_add(1, Ordering::Relaxed);
                info!(target: "announce", phrase = %text, "Spoke announcement");
            }
            Err(e) => {
                warn!(target: "announce", error = %e, "Speak sink failure");
            }
        }
    }
}

impl Inner {
    /// Per-invocation drain task. Pops the queue head, holds it for the
    /// batch window (sliced so the stop flag is observed promptly), absorbs
    /// whatever else arrived, rephrases, speaks, paces, repeats. Exits only
    /// via the stop flag.
    async fn drain_loop(inner: Arc<Inner>, state: Arc<ToolState>) {
        let pacing = inner.cfg.pacing_interval();
        loop {
            if state.is_stopped() {
                Self::discard(&inner, &state, 0);
                break;
            }

            let Some(first) = state.pop_front() else {
                sleep(pacing).await;
                continue;
            };

            let mut batch = vec![first];
            let deadline = Instant::now() + inner.cfg.batch_window();
            while Instant::now() < deadline && !state.is_stopped() {
                sleep(pacing).await;
            }
            while batch.len() < inner.cfg.max_batch_messages {
                match state.pop_front() {
                    Some(m) => batch.push(m),
                    None => break,
                }
            }

            // Completion may have arrived during the batch wait
            if state.is_stopped() {
                Self::discard(&inner, &state, batch.len());
                break;
            }

            let text = Self::phrase_for_batch(&inner, &state, &batch).await;
            match inner.sink.speak(&text).await {
                Ok(()) => {
                    state.mark_spoken();
                    inner
                        .history
                        .lock()
                        .unwrap()
                        .record_spoken(state.tool_name(), &text);
                    inner.counters.spoken.fetch_add(1, Ordering::Relaxed);
                    info!(
                        target: "announce",
                        tool = %state.tool_name(),
                        phrase = %text,
                        batched = batch.len(),
                        "Spoke progress"
                    );
                }
                Err(e) => {
                    warn!(
                        target: "announce",
                        tool = %state.tool_name(),
                        error = %e,
                        "Speak sink failure; continuing"
                    );
                }
            }

            sleep(pacing).await;
        }
    }

    async fn phrase_for_batch(inner: &Inner, state: &ToolState, batch: &[String]) -> String {
        let raw_fallback = batch.last().cloned().unwrap_or_default();
        if !inner.cfg.enable_natural_language {
            return raw_fallback;
        }

        let (spoken, raw) = {
            let h = inner.history.lock().unwrap();
            (
                h.recent_spoken(state.tool_name(), inner.cfg.rephrase_context_phrases),
                h.recent_raw(state.tool_name(), inner.cfg.rephrase_context_phrases),
            )
        };
        let request = RephraseRequest::Progress {
            messages: batch.to_vec(),
            spoken,
            raw,
        };

        match timeout(inner.cfg.rephrase_timeout(), inner.rephraser.rephrase(request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => raw_fallback,
            Ok(Err(e)) => {
                warn!(
                    target: "announce",
                    tool = %state.tool_name(),
                    error = %e,
                    "Rephrase failed; speaking raw message"
                );
                raw_fallback
            }
            Err(_) => {
                warn!(
                    target: "announce",
                    tool = %state.tool_name(),
                    timeout_ms = inner.cfg.rephrase_timeout_ms,
                    "Rephrase timed out; speaking raw message"
                );
                raw_fallback
            }
        }
    }

    fn discard(inner: &Inner, state: &ToolState, in_batch: usize) {
        let n = in_batch + state.discard_pending();
        if n > 0 {
            inner.counters.discarded.fetch_add(n as u64, Ordering::Relaxed);
            info!(
                target: "announce",
                invocation = %state.invocation_id(),
                tool = %state.tool_name(),
                discarded = n,
                "Cleared unspoken progress messages"
            );
        }
    }
}
