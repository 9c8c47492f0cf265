pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code; non-success codes are returned, not raised
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Lightweight page fetch. Transport failures (timeout, connection reset) are
/// errors; any HTTP response, whatever its status, is a `FetchResponse`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}
