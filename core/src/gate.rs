//! Dedup/batch gate: decides per incoming event whether it is spoken now,
//! merged into the pending batch, or dropped.
//!
//! The gate is synchronous and holds only per-turn state (whether the query
//! intent was already announced). Everything temporal it needs is handed in
//! as an `InvocationView` snapshot so decisions stay unit-testable.

use crate::config::AnnounceConfig;
use crate::event::RawEvent;
use crate::history::AnnouncementHistory;
use std::time::Duration;
use tracing::debug;

/// Outcome for one event. `Emit`/`Merge` carry the raw candidate text; the
/// coordinator decides whether the rephraser gets a shot at it.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Speak (or enqueue for speaking) now
    Emit(String),
    /// Coalesce into the invocation's pending batch
    Merge(String),
    /// Not worth speaking
    Drop(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The event kind is disabled by configuration
    Disabled,
    /// The query intent was already announced this turn
    AlreadyAnnounced,
    /// A normalized-equal phrase was heard within the dedup window
    Duplicate,
    /// The invocation already completed
    Stale,
    /// Matched a skip pattern; too technical to narrate
    TooGranular,
}

/// Snapshot of the target invocation as the gate needs to see it
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationView {
    pub stopped: bool,
    pub since_last_spoken: Option<Duration>,
}

pub struct Gate {
    cfg: AnnounceConfig,
    intent_announced: bool,
}

impl Gate {
    pub fn new(cfg: AnnounceConfig) -> Self {
        Self {
            cfg,
            intent_announced: false,
        }
    }

    /// Reset per-turn state. Called when a new user query starts a turn.
    pub fn begin_turn(&mut self) {
        self.intent_announced = false;
    }

    pub fn accept(
        &mut self,
        event: &RawEvent,
        view: InvocationView,
        history: &AnnouncementHistory,
    ) -> Decision {
        match event {
            RawEvent::QueryIntent { user_query, .. } => {
                if !self.cfg.enable_query_intent_announcement {
                    return Decision::Drop(DropReason::Disabled);
                }
                if self.intent_announced {
                    return Decision::Drop(DropReason::AlreadyAnnounced);
                }
                self.intent_announced = true;
                Decision::Emit(user_query.clone())
            }

            RawEvent::ToolAnnounce {
                tool_name,
                description,
                ..
            } => {
                if !self.cfg.enable_tool_announcements {
                    return Decision::Drop(DropReason::Disabled);
                }
                if view.stopped {
                    return Decision::Drop(DropReason::Stale);
                }
                let candidate = if description.is_empty() {
                    format!("Using {}", tool_name)
                } else {
                    description.clone()
                };
                if history.heard_recently(tool_name, &candidate) {
                    return Decision::Drop(DropReason::Duplicate);
                }
                Decision::Emit(candidate)
            }

            RawEvent::Progress {
                tool_name, message, ..
            } => {
                if !self.cfg.enable_progress_announcements {
                    return Decision::Drop(DropReason::Disabled);
                }
                if view.stopped {
                    return Decision::Drop(DropReason::Stale);
                }
                if self.too_granular(message) {
                    return Decision::Drop(DropReason::TooGranular);
                }
                if history.heard_recently(tool_name, message) {
                    return Decision::Drop(DropReason::Duplicate);
                }
                match view.since_last_spoken {
                    Some(elapsed) if elapsed < self.cfg.batch_window() => {
                        Decision::Merge(message.clone())
                    }
                    _ => Decision::Emit(message.clone()),
                }
            }

            // Completion is routed by the coordinator, never gated
            RawEvent::Completion { invocation_id } => {
                debug!(
                    target: "announce_gate",
                    invocation = %invocation_id,
                    "Completion reached the gate; nothing to decide"
                );
                Decision::Drop(DropReason::Stale)
            }
        }
    }

    fn too_granular(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.cfg.skip_patterns.iter().any(|p| lower.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(cfg: &AnnounceConfig) -> AnnouncementHistory {
        AnnouncementHistory::new(cfg.dedup_window(), cfg.history_max_entries)
    }

    fn progress(msg: &str) -> RawEvent {
        RawEvent::Progress {
            invocation_id: "inv-1".into(),
            tool_name: "get_sales".into(),
            message: msg.into(),
            progress: None,
            total: None,
        }
    }

    #[tokio::test]
    async fn test_progress_emits_when_nothing_spoken_yet() {
        let cfg = AnnounceConfig::default();
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let d = gate.accept(&progress("fetching rows"), InvocationView::default(), &h);
        assert_eq!(d, Decision::Emit("fetching rows".into()));
    }

    #[tokio::test]
    async fn test_progress_merges_inside_batch_window() {
        let cfg = AnnounceConfig::default();
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let view = InvocationView {
            stopped: false,
            since_last_spoken: Some(Duration::from_secs(1)),
        };
        let d = gate.accept(&progress("aggregating"), view, &h);
        assert_eq!(d, Decision::Merge("aggregating".into()));
    }

    #[tokio::test]
    async fn test_progress_stale_after_stop() {
        let cfg = AnnounceConfig::default();
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let view = InvocationView {
            stopped: true,
            since_last_spoken: None,
        };
        let d = gate.accept(&progress("late update"), view, &h);
        assert_eq!(d, Decision::Drop(DropReason::Stale));
    }

    #[tokio::test]
    async fn test_skip_patterns_filter_granular_messages() {
        let cfg = AnnounceConfig::default();
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let d = gate.accept(
            &progress("Finalizing the report layout"),
            InvocationView::default(),
            &h,
        );
        assert_eq!(d, Decision::Drop(DropReason::TooGranular));
    }

    #[tokio::test]
    async fn test_query_intent_disabled_drops() {
        let cfg = AnnounceConfig {
            enable_query_intent_announcement: false,
            ..Default::default()
        };
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let ev = RawEvent::QueryIntent {
            user_query: "how did the stores do last week".into(),
            tools_involved: vec![],
        };
        let d = gate.accept(&ev, InvocationView::default(), &h);
        assert_eq!(d, Decision::Drop(DropReason::Disabled));
    }

    #[tokio::test]
    async fn test_query_intent_once_per_turn() {
        let cfg = AnnounceConfig::default();
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let ev = RawEvent::QueryIntent {
            user_query: "compare this year to last".into(),
            tools_involved: vec![],
        };
        assert!(matches!(
            gate.accept(&ev, InvocationView::default(), &h),
            Decision::Emit(_)
        ));
        assert_eq!(
            gate.accept(&ev, InvocationView::default(), &h),
            Decision::Drop(DropReason::AlreadyAnnounced)
        );

        gate.begin_turn();
        assert!(matches!(
            gate.accept(&ev, InvocationView::default(), &h),
            Decision::Emit(_)
        ));
    }

    #[tokio::test]
    async fn test_tool_announce_suppressed_by_default() {
        let cfg = AnnounceConfig::default();
        let h = history(&cfg);
        let mut gate = Gate::new(cfg);

        let ev = RawEvent::ToolAnnounce {
            invocation_id: "inv-1".into(),
            tool_name: "get_sales".into(),
            description: String::new(),
            arguments: serde_json::Value::Null,
        };
        assert_eq!(
            gate.accept(&ev, InvocationView::default(), &h),
            Decision::Drop(DropReason::Disabled)
        );
    }

    #[tokio::test]
    async fn test_duplicate_progress_dropped() {
        let cfg = AnnounceConfig::default();
        let mut h = history(&cfg);
        let mut gate = Gate::new(cfg);

        h.record_raw("get_sales", "checking schema");
        let d = gate.accept(&progress("Checking schema!"), InvocationView::default(), &h);
        assert_eq!(d, Decision::Drop(DropReason::Duplicate));
    }
}
