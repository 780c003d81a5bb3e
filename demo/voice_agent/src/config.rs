use std::fs;
use std::path::Path;

use sotto_core::{AnnounceConfig, RephraserConfig};

/// High-level configuration for the Voice Agent demo
#[derive(Clone, Debug)]
pub struct VoiceAgentConfig {
    pub announce: AnnounceConfig,
    pub rephraser: RephraserConfig,
}

impl Default for VoiceAgentConfig {
    fn default() -> Self {
        // Feature module defaults already consider env vars
        let announce = AnnounceConfig::default();
        let mut rephraser = RephraserConfig::default();
        // The announcement model settings win over the generic LLM defaults
        rephraser.model = announce.announcement_model.clone();
        rephraser.temperature = announce.announcement_temperature;
        rephraser.request_timeout_ms = announce.rephrase_timeout_ms;
        Self {
            announce,
            rephraser,
        }
    }
}

impl VoiceAgentConfig {
    /// Load configuration from a TOML file (path via VOICE_AGENT_CONFIG or
    /// ./voice_agent.toml), overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("VOICE_AGENT_CONFIG").unwrap_or_else(|_| "voice_agent.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "voice_agent", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<VoiceAgentToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "voice_agent", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "voice_agent", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VoiceAgentToml {
    pub announce: Option<AnnounceToml>,
    pub rephraser: Option<RephraserToml>,
}

impl VoiceAgentToml {
    fn overlay(self, mut base: VoiceAgentConfig) -> VoiceAgentConfig {
        if let Some(a) = self.announce {
            a.apply(&mut base.announce);
        }
        if let Some(r) = self.rephraser {
            r.apply(&mut base.rephraser);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AnnounceToml {
    pub enable_tool_announcements: Option<bool>,
    pub enable_query_intent_announcement: Option<bool>,
    pub enable_progress_announcements: Option<bool>,
    pub enable_natural_language: Option<bool>,
    pub announcement_model: Option<String>,
    pub announcement_temperature: Option<f32>,
    pub dedup_window_seconds: Option<f64>,
    pub batch_window_seconds: Option<f64>,
    pub pacing_interval_seconds: Option<f64>,
    pub max_batch_messages: Option<usize>,
    pub rephrase_context_phrases: Option<usize>,
    pub rephrase_timeout_ms: Option<u64>,
    pub skip_patterns: Option<Vec<String>>,
    pub quiet_tools: Option<Vec<String>>,
    pub max_tool_steps: Option<u32>,
    pub client_session_timeout_seconds: Option<f64>,
}

impl AnnounceToml {
    fn apply(self, a: &mut AnnounceConfig) {
        if let Some(x) = self.enable_tool_announcements {
            a.enable_tool_announcements = x;
        }
        if let Some(x) = self.enable_query_intent_announcement {
            a.enable_query_intent_announcement = x;
        }
        if let Some(x) = self.enable_progress_announcements {
            a.enable_progress_announcements = x;
        }
        if let Some(x) = self.enable_natural_language {
            a.enable_natural_language = x;
        }
        if let Some(x) = self.announcement_model {
            a.announcement_model = x;
        }
        if let Some(x) = self.announcement_temperature {
            a.announcement_temperature = x;
        }
        if let Some(x) = self.dedup_window_seconds {
            a.dedup_window_seconds = x;
        }
        if let Some(x) = self.batch_window_seconds {
            a.batch_window_seconds = x;
        }
        if let Some(x) = self.pacing_interval_seconds {
            a.pacing_interval_seconds = x;
        }
        if let Some(x) = self.max_batch_messages {
            a.max_batch_messages = x;
        }
        if let Some(x) = self.rephrase_context_phrases {
            a.rephrase_context_phrases = x;
        }
        if let Some(x) = self.rephrase_timeout_ms {
            a.rephrase_timeout_ms = x;
        }
        if let Some(mut x) = self.skip_patterns {
            a.skip_patterns = x.drain(..).filter(|s| !s.is_empty()).collect();
        }
        if let Some(x) = self.quiet_tools {
            a.quiet_tools = x;
        }
        if let Some(x) = self.max_tool_steps {
            a.max_tool_steps = x;
        }
        if let Some(x) = self.client_session_timeout_seconds {
            a.client_session_timeout_seconds = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RephraserToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
}

impl RephraserToml {
    fn apply(self, r: &mut RephraserConfig) {
        if let Some(x) = self.base_url {
            r.base_url = x;
        }
        if let Some(x) = self.model {
            r.model = x;
        }
        if let Some(x) = self.api_key {
            r.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            r.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            r.temperature = x;
        }
    }
}
