// Raw announcement events
//
// Shapes mirror what a tool-execution transport delivers while a remote
// operation runs: a query intent when the assistant starts working, a tool
// announcement when a call goes out, progress notifications while it runs,
// and a completion carrying the invocation id. Arrival order per invocation
// id is the only sequencing the engine relies on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    /// The assistant is about to work through a user request with tools
    QueryIntent {
        user_query: String,
        #[serde(default)]
        tools_involved: Vec<String>,
    },
    /// A tool call is going out
    ToolAnnounce {
        invocation_id: String,
        tool_name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },
    /// A progress notification from a running tool
    Progress {
        invocation_id: String,
        tool_name: String,
        message: String,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        total: Option<f64>,
    },
    /// The tool finished; nothing further should be spoken about it
    Completion { invocation_id: String },
}

impl RawEvent {
    /// Invocation id this event belongs to, if any
    pub fn invocation_id(&self) -> Option<&str> {
        match self {
            RawEvent::ToolAnnounce { invocation_id, .. }
            | RawEvent::Progress { invocation_id, .. }
            | RawEvent::Completion { invocation_id } => Some(invocation_id),
            RawEvent::QueryIntent { .. } => None,
        }
    }

    /// Tool name this event carries, if any
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            RawEvent::ToolAnnounce { tool_name, .. } | RawEvent::Progress { tool_name, .. } => {
                Some(tool_name)
            }
            _ => None,
        }
    }
}
