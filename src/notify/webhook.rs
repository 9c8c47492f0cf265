use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::app::{Result, TrickleError};
use crate::notify::Notifier;

/// POSTs `{"text": ..., "content": ...}`, which Slack and Discord both accept.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "text": text, "content": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrickleError::Other(format!(
                "Webhook returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}
