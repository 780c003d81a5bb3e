//! Local TTS sink backed by espeak-ng.
//!
//! Probes PATH at startup; when no binary is found the sink degrades to
//! logging so the demo still runs on headless machines.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sotto_core::{Result, SottoError, SpeakSink};
use tokio::process::Command;
use tracing::{info, warn};

const SPEAK_TIMEOUT: Duration = Duration::from_secs(15);

pub struct EspeakSink {
    binary: Option<PathBuf>,
    /// Words per minute passed to espeak-ng
    rate: u32,
}

impl EspeakSink {
    pub fn new() -> Self {
        let binary = Self::find_binary();
        match &binary {
            Some(p) => info!(target: "voice_agent", path = %p.display(), "Using espeak-ng for speech"),
            None => warn!(
                target: "voice_agent",
                "espeak-ng not found on PATH; phrases will be logged instead of spoken"
            ),
        }
        Self { binary, rate: 175 }
    }

    fn find_binary() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var("ESPEAK_BIN") {
            let p = PathBuf::from(explicit);
            if p.exists() {
                return Some(p);
            }
        }
        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            for name in ["espeak-ng", "espeak"] {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[async_trait]
impl SpeakSink for EspeakSink {
    async fn speak(&self, text: &str) -> Result<()> {
        let Some(binary) = &self.binary else {
            info!(target: "voice_agent", phrase = %text, "speak (no TTS engine)");
            return Ok(());
        };

        let child = Command::new(binary)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg(text)
            .kill_on_drop(true)
            .status();

        let status = tokio::time::timeout(SPEAK_TIMEOUT, child)
            .await
            .map_err(|_| SottoError::SpeakSink("espeak-ng timed out".into()))?
            .map_err(|e| SottoError::SpeakSink(format!("failed to run espeak-ng: {e}")))?;

        if !status.success() {
            return Err(SottoError::SpeakSink(format!(
                "espeak-ng exited with {status}"
            )));
        }
        Ok(())
    }
}
