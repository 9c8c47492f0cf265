use std::sync::Arc;

use async_trait::async_trait;
use feed_rs::parser;

use crate::app::{Result, TrickleError};
use crate::discovery::DiscoverySource;
use crate::fetcher::Fetcher;

/// Job links from an RSS or Atom feed. Feeds have a single page.
pub struct FeedSource {
    name: String,
    url: String,
    filter: Option<String>,
    fetcher: Arc<dyn Fetcher>,
}

impl FeedSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        filter: Option<String>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            filter,
            fetcher,
        }
    }
}

/// Entry links from a feed body, falling back to the entry id when it is a URL.
pub fn feed_links(body: &[u8]) -> Result<Vec<String>> {
    let feed = parser::parse(body).map_err(|e| TrickleError::FeedParse(e.to_string()))?;

    let mut links: Vec<String> = Vec::new();
    for entry in feed.entries {
        let link = entry
            .links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| entry.links.first())
            .map(|l| l.href.trim().to_string())
            .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));

        if let Some(link) = link {
            if !link.is_empty() && !links.contains(&link) {
                links.push(link);
            }
        }
    }
    Ok(links)
}

#[async_trait]
impl DiscoverySource for FeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn paginated(&self) -> bool {
        false
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<String>> {
        if page > 1 {
            return Ok(Vec::new());
        }

        let response = self.fetcher.fetch(&self.url).await?;
        if !response.is_success() {
            return Err(TrickleError::Scraper(format!(
                "HTTP {} from {}",
                response.status, self.url
            )));
        }

        let links = feed_links(response.body.as_bytes())?
            .into_iter()
            .filter(|link| match &self.filter {
                Some(filter) => link.contains(filter.as_str()),
                None => true,
            })
            .collect();
        Ok(links)
    }
}
