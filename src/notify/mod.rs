//! Best-effort announcements of published postings.
//!
//! [`FanOut`] sends one formatted message to every configured channel.
//! Channel failures are logged and swallowed: a notification problem never
//! affects the publish that triggered it.

mod config;
mod telegram;
mod webhook;

pub use config::NotifyConfig;
pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::JobPosting;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, text: &str) -> Result<()>;
}

pub struct FanOut {
    channels: Vec<Arc<dyn Notifier>>,
    site_base_url: Option<String>,
}

impl FanOut {
    pub fn new(channels: Vec<Arc<dyn Notifier>>, site_base_url: Option<String>) -> Self {
        Self {
            channels,
            site_base_url,
        }
    }

    /// No channels at all.
    pub fn silent() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();

        if let Some(token) = config.telegram_token.as_deref().filter(|t| !t.is_empty()) {
            if config.telegram_chat_ids.is_empty() {
                tracing::warn!("Telegram token set but no chat ids configured");
            } else {
                channels.push(Arc::new(TelegramNotifier::new(
                    token,
                    config.telegram_chat_ids.clone(),
                    config.timeout(),
                )?));
            }
        }

        for url in &config.webhook_urls {
            channels.push(Arc::new(WebhookNotifier::new(url, config.timeout())?));
        }

        Ok(Self::new(channels, config.site_base_url.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Announce `posting` everywhere. Returns how many channels accepted it.
    pub async fn announce(&self, posting: &JobPosting) -> usize {
        if self.channels.is_empty() {
            return 0;
        }

        let text = format_message(posting, self.site_base_url.as_deref());
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.send(&text).await {
                Ok(()) => {
                    tracing::debug!(channel = channel.name(), id = posting.short_id(), "Notified");
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(channel = channel.name(), "Notification failed: {}", e);
                }
            }
        }
        delivered
    }
}

/// HTML message (Telegram's subset) summarizing a posting.
pub fn format_message(posting: &JobPosting, site_base_url: Option<&str>) -> String {
    let esc = |s: &str| html_escape::encode_text(s).into_owned();

    let mut lines = vec![
        format!("<b>{}</b>", esc(&posting.title)),
        format!("Company: {}", esc(&posting.company)),
        format!("Location: {}", esc(&posting.location)),
    ];
    if let Some(ref salary) = posting.salary {
        lines.push(format!("Salary: {}", esc(salary)));
    }
    lines.push(format!("Type: {}", esc(&posting.job_type)));
    if !posting.batch.is_empty() {
        lines.push(format!("Batch: {}", esc(&posting.batch.join(", "))));
    }
    lines.push(String::new());
    lines.push(format!(
        "<a href=\"{}\">Apply here</a>",
        html_escape::encode_double_quoted_attribute(&posting.apply_url)
    ));
    if let Some(base) = site_base_url.filter(|b| !b.is_empty()) {
        lines.push(format!(
            "{}/jobs/{}",
            base.trim_end_matches('/'),
            posting.id
        ));
    }
    lines.join("\n")
}
