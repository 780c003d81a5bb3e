//! Speak sink abstraction.
//!
//! The engine never talks to audio hardware; it hands finished phrases to a
//! sink and moves on. Sinks are fire-and-forget from the coordinator's
//! perspective: a failure is logged and the drain loop keeps going.

use crate::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeakSink: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Sink that logs phrases instead of synthesizing audio. Useful for
/// headless runs and as the degradation target when no TTS engine exists.
pub struct TracingSink;

#[async_trait]
impl SpeakSink for TracingSink {
    async fn speak(&self, text: &str) -> Result<()> {
        tracing::info!(target: "speak", phrase = %text, "speak");
        Ok(())
    }
}
