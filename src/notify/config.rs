use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Telegram bot token; `TRICKLE_TELEGRAM_TOKEN` takes precedence
    pub telegram_token: Option<String>,

    /// Channel or group ids (`@channel` or numeric)
    pub telegram_chat_ids: Vec<String>,

    /// Generic JSON webhooks (Slack- and Discord-compatible)
    pub webhook_urls: Vec<String>,

    /// Public site root; adds a `<base>/jobs/<id>` link to every message
    pub site_base_url: Option<String>,

    /// Request timeout in seconds (default: 15)
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            telegram_chat_ids: Vec::new(),
            webhook_urls: Vec::new(),
            site_base_url: None,
            timeout_secs: 15,
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
