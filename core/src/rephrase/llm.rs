//! LLM-backed rephraser over an OpenAI-compatible chat completions endpoint.

use super::{build_prompt, RephraseRequest, Rephraser};
use crate::{Result, SottoError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for `LlmRephraser` loaded from environment variables
#[derive(Debug, Clone)]
pub struct RephraserConfig {
    pub base_url: String, // e.g., https://api.openai.com/v1
    pub model: String,
    pub api_key: Option<String>,
    /// HTTP budget for one rephrase call. Deliberately short: a listener
    /// would rather hear the raw message than wait.
    pub request_timeout_ms: u64,
    pub temperature: f32,
}

impl Default for RephraserConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ANNOUNCEMENT_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: std::env::var("ANNOUNCEMENT_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("REPHRASE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(2_000),
            temperature: std::env::var("ANNOUNCEMENT_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.9),
        }
    }
}

/// HTTP client for the chat completions rephrase call
#[derive(Clone)]
pub struct LlmRephraser {
    http: Client,
    cfg: RephraserConfig,
}

impl LlmRephraser {
    pub fn new(cfg: RephraserConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(RephraserConfig::default())
    }
}

#[async_trait]
impl Rephraser for LlmRephraser {
    async fn rephrase(&self, request: RephraseRequest) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        let prompt = build_prompt(&request);
        debug!(target: "rephraser", %url, model = %self.cfg.model, "POST chat completions");

        let body = json!({
            "model": self.cfg.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": request.max_tokens(),
            "temperature": self.cfg.temperature,
        });

        let mut req = self.http.post(&url).header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                SottoError::RephraseTimeout(self.cfg.request_timeout_ms)
            } else {
                SottoError::RephraseProvider(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(target: "rephraser", %status, body = %text, "Chat completions error");
            return Err(SottoError::RephraseProvider(format!(
                "status={} body={}",
                status, text
            )));
        }

        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SottoError::RephraseProvider(format!("invalid JSON: {e}")))?;

        extract_text(&val)
            .map(|s| trim_quotes(&s))
            .ok_or_else(|| {
                SottoError::RephraseProvider(
                    "missing choices[0].message.content in chat completions".into(),
                )
            })
    }
}

fn extract_text(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

/// Models like to quote the phrase they were asked for
fn trim_quotes(s: &str) -> String {
    s.trim().trim_matches('"').trim_matches('\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_chat_shape() {
        let v = serde_json::json!({
            "choices": [{"message": {"content": "Okay, comparing now"}}]
        });
        assert_eq!(extract_text(&v).as_deref(), Some("Okay, comparing now"));
    }

    #[test]
    fn test_extract_text_missing_content() {
        let v = serde_json::json!({"choices": [{"message": {}}]});
        assert!(extract_text(&v).is_none());
    }

    #[test]
    fn test_trim_quotes() {
        assert_eq!(trim_quotes("\"Got it\"\n"), "Got it");
        assert_eq!(trim_quotes("'Almost there'"), "Almost there");
        assert_eq!(trim_quotes("plain"), "plain");
    }
}
