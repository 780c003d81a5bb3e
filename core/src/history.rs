//! Bounded per-session announcement history.
//!
//! Holds two kinds of entries: raw progress messages the gate accepted
//! (these back the dedup check) and phrases actually spoken (these feed the
//! rephraser's "avoid repeating" context). The window is time-bounded by
//! the dedup window for the dedup query and count-capped overall. Owned by
//! a single session; never shared across sessions.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Raw message accepted by the gate
    Raw,
    /// Phrase that reached the speak sink
    Spoken,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub tool: String,
    pub text: String,
    pub kind: EntryKind,
    pub at: Instant,
}

#[derive(Debug)]
pub struct AnnouncementHistory {
    dedup_window: Duration,
    max_entries: usize,
    entries: VecDeque<HistoryEntry>,
}

impl AnnouncementHistory {
    pub fn new(dedup_window: Duration, max_entries: usize) -> Self {
        Self {
            dedup_window,
            max_entries: max_entries.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Record a raw message the gate accepted for speaking
    pub fn record_raw(&mut self, tool: &str, text: &str) {
        self.record(EntryKind::Raw, tool, text);
    }

    /// Record a phrase that actually reached the speak sink
    pub fn record_spoken(&mut self, tool: &str, text: &str) {
        self.record(EntryKind::Spoken, tool, text);
    }

    fn record(&mut self, kind: EntryKind, tool: &str, text: &str) {
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            tool: tool.to_string(),
            text: text.to_string(),
            kind,
            at: Instant::now(),
        });
        self.prune();
    }

    /// Was a normalized-equal phrase for this tool heard within the dedup
    /// window?
    pub fn heard_recently(&self, tool: &str, text: &str) -> bool {
        let wanted = normalize(text);
        self.entries.iter().rev().any(|e| {
            e.tool == tool && e.at.elapsed() <= self.dedup_window && normalize(&e.text) == wanted
        })
    }

    /// Most recent spoken phrases for a tool, oldest first
    pub fn recent_spoken(&self, tool: &str, n: usize) -> Vec<String> {
        self.recent(tool, EntryKind::Spoken, n)
    }

    /// Most recent raw messages for a tool, oldest first
    pub fn recent_raw(&self, tool: &str, n: usize) -> Vec<String> {
        self.recent(tool, EntryKind::Raw, n)
    }

    fn recent(&self, tool: &str, kind: EntryKind, n: usize) -> Vec<String> {
        let mut out: Vec<String> = self
            .entries
            .iter()
            .rev()
            .filter(|e| e.kind == kind && e.tool == tool)
            .take(n)
            .map(|e| e.text.clone())
            .collect();
        out.reverse();
        out
    }

    /// Drop raw entries well past the dedup window; spoken entries stay
    /// until the count cap pushes them out (they are rephrase context, not
    /// just dedup state).
    fn prune(&mut self) {
        let horizon = self.dedup_window * 2;
        self.entries
            .retain(|e| e.kind == EntryKind::Spoken || e.at.elapsed() <= horizon);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
