// Sotto Core Library
// Announcement scheduling and deduplication engine for tool-calling voice agents

pub mod config;
pub mod coordinator;
pub mod event;
pub mod gate;
pub mod history;
pub mod rephrase;
pub mod speak;
pub mod state;

// Export core types
pub use config::AnnounceConfig;
pub use coordinator::{AnnounceStats, AnnouncementCoordinator};
pub use event::RawEvent;
pub use gate::{Decision, DropReason, Gate, InvocationView};
pub use history::AnnouncementHistory;
pub use rephrase::{LlmRephraser, RephraseRequest, Rephraser, RephraserConfig};
pub use speak::{SpeakSink, TracingSink};
pub use state::ToolState;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SottoError {
    #[error("Rephrase timed out after {0} ms")]
    RephraseTimeout(u64),

    #[error("Rephrase provider error: {0}")]
    RephraseProvider(String),

    #[error("Speak sink failure: {0}")]
    SpeakSink(String),

    #[error("Unknown invocation: {0}")]
    UnknownInvocation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SottoError>;
