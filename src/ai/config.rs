use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat-completions endpoint used for extraction and refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,

    pub model: String,

    /// API key; `TRICKLE_AI_API_KEY` takes precedence
    pub api_key: Option<String>,

    pub temperature: f32,

    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,

    /// Extraction input is cut to this many bytes (default: 12000)
    pub max_input_bytes: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.2,
            timeout_secs: 60,
            max_input_bytes: 12_000,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
