use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::app::{Result, TrickleError};
use crate::notify::Notifier;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Bot API `sendMessage`, one call per chat id.
pub struct TelegramNotifier {
    http: reqwest::Client,
    token: String,
    chat_ids: Vec<String>,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_ids: Vec<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token: token.to_string(),
            chat_ids,
            api_base: TELEGRAM_API_URL.to_string(),
        })
    }

    pub fn with_api_base(mut self, url: &str) -> Self {
        self.api_base = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let mut failures = Vec::new();

        for chat_id in &self.chat_ids {
            let body = json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            });

            let response = self.http.post(&url).json(&body).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                failures.push(format!("{} ({}): {}", chat_id, status, error_text));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TrickleError::Other(format!(
                "Telegram API error: {}",
                failures.join("; ")
            )))
        }
    }
}
