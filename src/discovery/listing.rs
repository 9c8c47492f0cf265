use std::sync::Arc;

use async_trait::async_trait;
use ::scraper::{Html, Selector};
use url::Url;

use crate::app::{Result, TrickleError};
use crate::discovery::DiscoverySource;
use crate::fetcher::Fetcher;

/// An HTML page listing job links, optionally paginated through a `{page}`
/// placeholder in its URL.
pub struct HtmlListingSource {
    name: String,
    url_template: String,
    link_selector: Selector,
    filter: Option<String>,
    fetcher: Arc<dyn Fetcher>,
}

impl HtmlListingSource {
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        link_selector: &str,
        filter: Option<String>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let link_selector = Selector::parse(link_selector).map_err(|e| {
            TrickleError::Config(format!("Invalid link selector '{}': {:?}", link_selector, e))
        })?;

        Ok(Self {
            name: name.into(),
            url_template: url_template.into(),
            link_selector,
            filter,
            fetcher,
        })
    }

    pub fn page_url(&self, page: u32) -> String {
        self.url_template.replace("{page}", &page.to_string())
    }

    fn extract_links(&self, body: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let base = Url::parse(page_url).ok();

        let mut links: Vec<String> = Vec::new();
        for element in document.select(&self.link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let resolved = match &base {
                Some(base) => base.join(href.trim()),
                None => Url::parse(href.trim()),
            };
            let Ok(mut url) = resolved else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            url.set_fragment(None);
            let link = url.to_string();

            if let Some(filter) = &self.filter {
                if !link.contains(filter.as_str()) {
                    continue;
                }
            }
            if !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }
}

#[async_trait]
impl DiscoverySource for HtmlListingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn paginated(&self) -> bool {
        self.url_template.contains("{page}")
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<String>> {
        let url = self.page_url(page);
        let response = self.fetcher.fetch(&url).await?;

        // Running past the last page often yields a 404
        if response.status == 404 && page > 1 {
            return Ok(Vec::new());
        }
        if !response.is_success() {
            return Err(TrickleError::Scraper(format!(
                "HTTP {} from {}",
                response.status, url
            )));
        }

        Ok(self.extract_links(&response.body, &response.final_url))
    }
}
