//! Source adapters: turn a job-posting URL into a [`ScrapedCandidate`].
//!
//! # Architecture
//!
//! ```text
//! URL → vendor API (Greenhouse, Lever)
//!     → static fetch → JSON-LD / content regions
//!     → headless Chrome (blocked, network failure, empty page)
//!     → expired check → apply-link resolution → ScrapedCandidate
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use trickle::scraper::{ChromeRenderer, PageScraper, ScraperConfig, SourceAdapter};
//!
//! let config = ScraperConfig::default();
//! let fetcher = Arc::new(HttpFetcher::new(&config.user_agent, config.fetch_timeout())?);
//! let renderer = Arc::new(ChromeRenderer::new(config.clone()));
//! let scraper = PageScraper::new(config, fetcher, renderer);
//!
//! match scraper.scrape("https://jobs.lever.co/acme/abc").await {
//!     Outcome::Done(candidate) => println!("{}", candidate.title),
//!     other => println!("{:?}", other.reason()),
//! }
//! ```

pub mod apply;
mod chrome;
mod config;
pub mod extractor;
mod page;
pub mod signals;
pub mod vendor;

pub use chrome::{ChromeRenderer, DisabledRenderer, Renderer};
pub use config::ScraperConfig;
pub use extractor::{ContentExtractor, PageExtract};
pub use page::PageScraper;

use async_trait::async_trait;

use crate::domain::{Outcome, ScrapedCandidate};

/// A strategy for scraping one posting URL.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn scrape(&self, url: &str) -> Outcome<ScrapedCandidate>;
}
