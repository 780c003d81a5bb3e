//! Natural-language rephrasing of announcement events.
//!
//! The engine treats rephrasing as an opaque async text-to-text function
//! with latency and failure modes. `LlmRephraser` is the production
//! implementation over an OpenAI-compatible chat endpoint; tests inject
//! fakes. A rephrase failure never silences an announcement: callers fall
//! back to the raw message or a canned phrase.

mod llm;
mod prompt;

pub use llm::{LlmRephraser, RephraserConfig};
pub use prompt::build_prompt;

use crate::Result;
use async_trait::async_trait;

/// One rephrase call. Owns its data so requests can be built on the event
/// path and handed to a background task.
#[derive(Debug, Clone)]
pub enum RephraseRequest {
    /// Upfront "here is what I'm about to do" opener for a user query
    QueryIntent {
        user_query: String,
        tools_involved: Vec<String>,
    },
    /// A tool call going out
    ToolCall {
        user_query: String,
        tool_name: String,
        description: String,
        arguments: serde_json::Value,
        /// Phrases already spoken this turn; the model is told to vary
        avoid: Vec<String>,
        /// Metadata-style tool: announce with a brief "one moment" instead
        /// of narrating the call
        quiet: bool,
    },
    /// A batch of progress messages to fold into one casual update
    Progress {
        messages: Vec<String>,
        /// Recent spoken phrases for this tool, oldest first
        spoken: Vec<String>,
        /// Recent raw messages for this tool, oldest first
        raw: Vec<String>,
    },
}

impl RephraseRequest {
    /// Canned phrase used when the rephraser fails or times out
    pub fn fallback(&self) -> String {
        match self {
            RephraseRequest::QueryIntent { .. } => "OK, let me work on that for you.".to_string(),
            RephraseRequest::ToolCall { .. } => "Let me check that for you.".to_string(),
            RephraseRequest::Progress { messages, .. } => messages
                .last()
                .cloned()
                .unwrap_or_else(|| "Still working on that.".to_string()),
        }
    }

    /// Output budget per kind: progress updates are the tersest
    pub fn max_tokens(&self) -> u32 {
        match self {
            RephraseRequest::QueryIntent { .. } => 40,
            RephraseRequest::ToolCall { .. } => 35,
            RephraseRequest::Progress { .. } => 20,
        }
    }
}

#[async_trait]
pub trait Rephraser: Send + Sync {
    async fn rephrase(&self, request: RephraseRequest) -> Result<String>;
}
