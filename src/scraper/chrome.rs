use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::app::{Result, TrickleError};
use crate::domain::{Failure, Outcome};
use crate::scraper::apply::is_http;
use crate::scraper::config::ScraperConfig;
use crate::scraper::extractor::{ContentExtractor, PageExtract};

const POPUP_POLL: Duration = Duration::from_millis(250);

/// Full browser rendering, used when the lightweight fetch fails or is blocked.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `url` and extract the posting. Never panics or raises; an
    /// unavailable browser is reported as `Failed(Other("not available"))`.
    async fn render(&self, url: &str) -> Outcome<PageExtract>;
}

/// Renderer for environments without a browser.
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, _url: &str) -> Outcome<PageExtract> {
        Failure::Other("not available".to_string()).into()
    }
}

/// Headless Chrome via chromiumoxide. A fresh browser is launched for every
/// call and always torn down before returning.
pub struct ChromeRenderer {
    config: ScraperConfig,
    extractor: ContentExtractor,
}

impl ChromeRenderer {
    pub fn new(config: ScraperConfig) -> Self {
        let extractor = ContentExtractor::new(config.clone());
        Self { config, extractor }
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>)> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .request_timeout(self.config.navigation_timeout());

        if !self.config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| TrickleError::Scraper(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            TrickleError::Scraper(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    async fn render_page(
        &self,
        browser: &Browser,
        url: &str,
    ) -> std::result::Result<PageExtract, Failure> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Failure::Other(format!("Failed to create page: {}", e)))?;

        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| Failure::Other(format!("Failed to set user agent: {}", e)))?;

        // Images, fonts and media are never needed for text extraction
        page.execute(EnableParams::default())
            .await
            .map_err(|e| Failure::Other(format!("Failed to enable network domain: {}", e)))?;
        page.execute(SetBlockedUrLsParams::new(
            self.config.blocked_url_patterns.clone(),
        ))
        .await
        .map_err(|e| Failure::Other(format!("Failed to block resources: {}", e)))?;

        match tokio::time::timeout(self.config.navigation_timeout(), page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(Failure::Network(format!("Navigation failed: {}", e))),
            Err(_) => return Err(Failure::Network("navigation timed out".to_string())),
        }

        // Settle delay for client-side rendering
        tokio::time::sleep(self.config.wait_after_load()).await;

        let script = self.extractor.extraction_script();
        let result: serde_json::Value = page
            .evaluate(script)
            .await
            .map_err(|e| Failure::Other(format!("Script execution failed: {}", e)))?
            .into_value()
            .map_err(|e| Failure::Other(format!("Failed to parse result: {:?}", e)))?;

        let mut extract = self.extractor.from_script_result(&result, url);
        extract.apply_url = self.follow_apply(browser, &page).await;

        if let Some(ref apply_url) = extract.apply_url {
            tracing::debug!(url = %url, apply_url = %apply_url, "Captured apply destination");
        }

        Ok(extract)
    }

    /// Click the apply control and capture where it leads: a newly opened tab,
    /// or failing that a same-tab navigation.
    async fn follow_apply(&self, browser: &Browser, page: &Page) -> Option<String> {
        let before: Vec<TargetId> = browser
            .pages()
            .await
            .ok()?
            .iter()
            .map(|p| p.target_id().clone())
            .collect();
        let start_url = page.url().await.ok().flatten();

        let clicked: bool = page
            .evaluate(ContentExtractor::apply_click_script())
            .await
            .ok()?
            .into_value()
            .ok()?;
        if !clicked {
            return None;
        }

        let deadline = Instant::now() + self.config.apply_popup_wait();
        while Instant::now() < deadline {
            tokio::time::sleep(POPUP_POLL).await;
            let Ok(pages) = browser.pages().await else {
                continue;
            };
            for opened in pages.iter().filter(|p| !before.contains(p.target_id())) {
                if let Ok(Some(opened_url)) = opened.url().await {
                    if is_http(&opened_url) {
                        return Some(opened_url);
                    }
                }
            }
        }

        let current = page.url().await.ok().flatten()?;
        (Some(&current) != start_url.as_ref() && is_http(&current)).then_some(current)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Outcome<PageExtract> {
        let (mut browser, handler_task) = match self.launch().await {
            Ok(launched) => launched,
            Err(e) => {
                tracing::warn!("Headless renderer not available: {}", e);
                return Failure::Other("not available".to_string()).into();
            }
        };

        tracing::info!(url = %url, "Rendering with headless browser");
        let result = self.render_page(&browser, url).await;

        if let Err(e) = browser.close().await {
            tracing::debug!("Failed to close browser: {}", e);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        match result {
            Ok(extract) => Outcome::Done(extract),
            Err(failure) => {
                tracing::warn!(url = %url, "Headless render failed: {}", failure);
                failure.into()
            }
        }
    }
}
