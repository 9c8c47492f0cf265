//! Discovery: walking listing pages and feeds for job links and handing new
//! ones to the drip-feed queue.

mod config;
mod feed;
mod listing;
mod scanner;

pub use config::{DiscoveryConfig, SourceConfig};
pub use feed::FeedSource;
pub use listing::HtmlListingSource;
pub use scanner::{DiscoveryScanner, ScanDepth, ScanReport, SourceReport};

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::fetcher::Fetcher;

#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &str;

    /// Whether pages past the first exist. Unpaginated sources are read once.
    fn paginated(&self) -> bool;

    /// Links on page `page` (1-based). An empty page ends the walk.
    async fn fetch_page(&self, page: u32) -> Result<Vec<String>>;
}

/// Build the configured sources. An invalid entry fails the whole set so a
/// typo in the config file is noticed at startup.
pub fn build_sources(
    configs: &[SourceConfig],
    fetcher: Arc<dyn Fetcher>,
) -> Result<Vec<Arc<dyn DiscoverySource>>> {
    configs
        .iter()
        .map(|config| -> Result<Arc<dyn DiscoverySource>> {
            Ok(match config {
                SourceConfig::Listing {
                    name,
                    url,
                    link_selector,
                    filter,
                } => Arc::new(HtmlListingSource::new(
                    name.clone(),
                    url.clone(),
                    link_selector,
                    filter.clone(),
                    fetcher.clone(),
                )?),
                SourceConfig::Feed { name, url, filter } => Arc::new(FeedSource::new(
                    name.clone(),
                    url.clone(),
                    filter.clone(),
                    fetcher.clone(),
                )),
            })
        })
        .collect()
}
