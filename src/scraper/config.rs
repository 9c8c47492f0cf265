use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the source adapters and the headless render fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Allow escalation to headless Chrome when a plain fetch fails (default: true)
    pub render_fallback: bool,

    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// HTTP request timeout in seconds (default: 20)
    pub fetch_timeout_secs: u64,

    /// Page navigation timeout in seconds for the headless fallback (default: 60)
    pub navigation_timeout_secs: u64,

    /// Settle delay after network idle, for client-side rendering, in milliseconds (default: 2000)
    pub wait_after_load_ms: u64,

    /// Wait for a new tab after clicking the apply control, in milliseconds (default: 5000)
    pub apply_popup_wait_ms: u64,

    /// Minimum text length for a content region to be accepted (default: 100)
    pub min_region_length: usize,

    /// Maximum characters of content handed to the AI stage (default: 8000)
    pub max_content_chars: usize,

    /// Scraped content at least this long justifies using the source URL as
    /// the apply link when no external one exists (default: 1000)
    pub substantial_content_chars: usize,

    /// CSS selectors to try for the posting body, in priority order
    pub content_selectors: Vec<String>,

    /// CSS selectors for elements to remove (navigation, scripts, etc.)
    pub remove_selectors: Vec<String>,

    /// URL patterns blocked in the headless browser (images, fonts, media)
    pub blocked_url_patterns: Vec<String>,

    /// User agent string to use
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            render_fallback: true,
            headless: true,
            fetch_timeout_secs: 20,
            navigation_timeout_secs: 60,
            wait_after_load_ms: 2000,
            apply_popup_wait_ms: 5000,
            min_region_length: 100,
            max_content_chars: 8000,
            substantial_content_chars: 1000,
            content_selectors: vec![
                // Job boards first, then generic article containers
                ".job-description".to_string(),
                "#job-description".to_string(),
                "[class*=\"jobDescription\"]".to_string(),
                ".posting-page".to_string(),
                ".job-details".to_string(),
                ".job-content".to_string(),
                "article".to_string(),
                "[role=\"main\"]".to_string(),
                "main".to_string(),
                ".post-content".to_string(),
                ".entry-content".to_string(),
                ".content".to_string(),
                "#content".to_string(),
            ],
            remove_selectors: vec![
                "nav".to_string(),
                "header".to_string(),
                "footer".to_string(),
                "aside".to_string(),
                ".sidebar".to_string(),
                ".advertisement".to_string(),
                ".ads".to_string(),
                ".social-share".to_string(),
                ".comments".to_string(),
                ".related-posts".to_string(),
                "script".to_string(),
                "style".to_string(),
                "noscript".to_string(),
            ],
            blocked_url_patterns: vec![
                "*.png".to_string(),
                "*.jpg".to_string(),
                "*.jpeg".to_string(),
                "*.gif".to_string(),
                "*.webp".to_string(),
                "*.svg".to_string(),
                "*.ico".to_string(),
                "*.woff".to_string(),
                "*.woff2".to_string(),
                "*.ttf".to_string(),
                "*.otf".to_string(),
                "*.mp4".to_string(),
                "*.webm".to_string(),
                "*.mp3".to_string(),
            ],
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }

    pub fn apply_popup_wait(&self) -> Duration {
        Duration::from_millis(self.apply_popup_wait_ms)
    }
}
