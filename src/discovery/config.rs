use serde::{Deserialize, Serialize};

use crate::dedup::DEFAULT_STREAK_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Interval between quick scans in the daemon (default: "1h")
    pub scan_interval: String,
    /// Interval between deep scans in the daemon (default: "24h")
    pub deep_scan_interval: String,
    /// Pages walked per paginated source on a quick scan
    pub quick_pages: u32,
    /// Pages walked per paginated source on a deep scan
    pub deep_pages: u32,
    /// Consecutive known links after which paging stops
    pub streak_limit: usize,
    /// Priority given to discovered links
    pub priority: u8,
    pub sources: Vec<SourceConfig>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_interval: "1h".to_string(),
            deep_scan_interval: "24h".to_string(),
            quick_pages: 2,
            deep_pages: 20,
            streak_limit: DEFAULT_STREAK_LIMIT,
            priority: 0,
            sources: Vec::new(),
        }
    }
}

/// One `[[discovery.sources]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// An HTML listing page. `url` may contain `{page}` for pagination.
    Listing {
        name: String,
        url: String,
        link_selector: String,
        #[serde(default)]
        filter: Option<String>,
    },
    /// An RSS or Atom feed.
    Feed {
        name: String,
        url: String,
        #[serde(default)]
        filter: Option<String>,
    },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Listing { name, .. } | SourceConfig::Feed { name, .. } => name,
        }
    }
}
