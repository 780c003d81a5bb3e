// Session configuration for the announcement engine
//
// One immutable struct constructed per session and shared by the
// coordinator, gate, and drain loops. Defaults consider environment
// variables so embedders get sensible behavior without extra wiring;
// TOML overlay handling lives in the demo binary.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnnounceConfig {
    /// Announce outgoing tool calls (off by default: arguments are usually
    /// not informative while the call is still in flight)
    pub enable_tool_announcements: bool,
    /// Announce the upfront "here is what I'm about to do" statement
    pub enable_query_intent_announcement: bool,
    /// Announce progress notifications from running tools
    pub enable_progress_announcements: bool,
    /// Rewrite technical messages into conversational speech via the rephraser
    pub enable_natural_language: bool,
    /// Model used for rephrasing
    pub announcement_model: String,
    /// Sampling temperature for rephrasing (high for variety)
    pub announcement_temperature: f32,
    /// Identical phrases for the same tool are suppressed within this window
    pub dedup_window_seconds: f64,
    /// Progress messages arriving within this window are coalesced
    pub batch_window_seconds: f64,
    /// Drain loop poll interval
    pub pacing_interval_seconds: f64,
    /// Upper bound on messages folded into one utterance
    pub max_batch_messages: usize,
    /// Cap on the announcement history window
    pub history_max_entries: usize,
    /// How many prior phrases are handed to the rephraser as context
    pub rephrase_context_phrases: usize,
    /// Rephrase call budget; falls back to raw text when exceeded.
    /// Deliberately short and unrelated to the tool-execution timeout.
    pub rephrase_timeout_ms: u64,
    /// Progress messages containing any of these substrings are too
    /// granular to be worth speaking
    pub skip_patterns: Vec<String>,
    /// Tools announced with a brief "one moment" instead of a narrated call
    pub quiet_tools: Vec<String>,
    /// Upper bound on tool steps per turn
    pub max_tool_steps: u32,
    /// Overall tool-execution session timeout (minutes-scale; slow
    /// operations may need up to 600 s)
    pub client_session_timeout_seconds: f64,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            enable_tool_announcements: env_bool("ENABLE_TOOL_ANNOUNCEMENTS", false),
            enable_query_intent_announcement: env_bool("ENABLE_QUERY_INTENT_ANNOUNCEMENT", true),
            enable_progress_announcements: env_bool("ENABLE_PROGRESS_ANNOUNCEMENTS", true),
            enable_natural_language: env_bool("ENABLE_NATURAL_LANGUAGE", true),
            announcement_model: std::env::var("ANNOUNCEMENT_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o".to_string()),
            announcement_temperature: env_parse("ANNOUNCEMENT_TEMPERATURE", 0.9),
            dedup_window_seconds: env_parse("DEDUP_WINDOW_SECONDS", 3.0),
            batch_window_seconds: env_parse("BATCH_WINDOW_SECONDS", 5.0),
            pacing_interval_seconds: env_parse("PACING_INTERVAL_SECONDS", 0.1),
            max_batch_messages: env_parse("MAX_BATCH_MESSAGES", 5),
            history_max_entries: env_parse("HISTORY_MAX_ENTRIES", 64),
            rephrase_context_phrases: env_parse("REPHRASE_CONTEXT_PHRASES", 3),
            rephrase_timeout_ms: env_parse("REPHRASE_TIMEOUT_MS", 2_000),
            skip_patterns: default_skip_patterns(),
            quiet_tools: Vec::new(),
            max_tool_steps: env_parse("MAX_TOOL_STEPS", 10),
            client_session_timeout_seconds: env_parse("CLIENT_SESSION_TIMEOUT", 300.0),
        }
    }
}

impl AnnounceConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs_f64(self.dedup_window_seconds.max(0.0))
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_secs_f64(self.batch_window_seconds.max(0.0))
    }

    pub fn pacing_interval(&self) -> Duration {
        // A zero pacing interval would spin the drain loop
        Duration::from_secs_f64(self.pacing_interval_seconds.max(0.001))
    }

    pub fn rephrase_timeout(&self) -> Duration {
        Duration::from_millis(self.rephrase_timeout_ms)
    }
}

/// Substrings marking progress messages as procedural noise rather than
/// something a listener wants narrated
fn default_skip_patterns() -> Vec<String> {
    [
        "selecting",
        "identifying",
        "gathering all",
        "calculating the total",
        "finalizing the",
        "compiling the final",
        "diving into",
        "let's break down",
        "exploring new patterns",
        "ready to save",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AnnounceConfig::default();
        assert!(!cfg.enable_tool_announcements);
        assert!(cfg.enable_progress_announcements);
        assert_eq!(cfg.dedup_window(), Duration::from_secs(3));
        assert_eq!(cfg.batch_window(), Duration::from_secs(5));
        assert_eq!(cfg.pacing_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_pacing_never_zero() {
        let cfg = AnnounceConfig {
            pacing_interval_seconds: 0.0,
            ..Default::default()
        };
        assert!(cfg.pacing_interval() > Duration::ZERO);
    }
}
