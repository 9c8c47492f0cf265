//! Configuration management for trickle.
//!
//! Configuration is read from `~/.config/trickle/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! Secrets can also come from the environment, which wins over the file.

use crate::ai::AiConfig;
use crate::discovery::DiscoveryConfig;
use crate::domain::settings::DEFAULT_INTERVAL_MINUTES;
use crate::domain::work_item::DEFAULT_MAX_RETRIES;
use crate::notify::NotifyConfig;
use crate::scraper::ScraperConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ENV_AI_API_KEY: &str = "TRICKLE_AI_API_KEY";
pub const ENV_TELEGRAM_TOKEN: &str = "TRICKLE_TELEGRAM_TOKEN";
pub const ENV_DB: &str = "TRICKLE_DB";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database path; defaults to `<data_dir>/trickle/trickle.db`
    pub database: Option<PathBuf>,
    pub scraper: ScraperConfig,
    pub ai: AiConfig,
    pub queue: QueueConfig,
    pub discovery: DiscoveryConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Spacing between queued postings, used until changed with `trickle interval`
    pub interval_minutes: u32,
    pub max_retries: u32,
    /// How often the daemon looks for a due item (default: "1m")
    pub tick_interval: String,
    /// Priority of links queued by hand (default: 5)
    pub manual_priority: u8,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            max_retries: DEFAULT_MAX_RETRIES,
            tick_interval: "1m".to_string(),
            manual_priority: 5,
        }
    }
}

impl Config {
    /// Load configuration from the default path, then apply environment overrides.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Secrets and the database path from the environment. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(ENV_AI_API_KEY) {
            self.ai.api_key = Some(key);
        }
        if let Some(token) = lookup(ENV_TELEGRAM_TOKEN) {
            self.notify.telegram_token = Some(token);
        }
        if let Some(path) = lookup(ENV_DB) {
            self.database = Some(PathBuf::from(path));
        }
    }

    /// Get the default config file path: `~/.config/trickle/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("trickle").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# trickle configuration
#
# Secrets may instead be set in the environment:
#   TRICKLE_AI_API_KEY, TRICKLE_TELEGRAM_TOKEN, TRICKLE_DB (database path)
#
# Intervals are written as "30s", "5m", "1h" or "1d".

# database = "/var/lib/trickle/trickle.db"

[scraper]
# Escalate to headless Chrome when a plain fetch is blocked or empty
render_fallback = true

# Run the browser without a visible window
headless = true

# Plain HTTP fetch timeout in seconds
fetch_timeout_secs = 20

# Headless page navigation timeout in seconds
navigation_timeout_secs = 60

# Settle delay after load for client-side rendering (milliseconds)
wait_after_load_ms = 2000

# How long to wait for a new tab after clicking "Apply" (milliseconds)
apply_popup_wait_ms = 5000

# A content region must be longer than this to be used
min_region_length = 100

# Content handed to the AI stage is cut to this many characters
max_content_chars = 8000

# Content at least this long lets the source page stand in as the apply link
substantial_content_chars = 1000

[ai]
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
# api_key = "sk-..."
temperature = 0.2
timeout_secs = 60

[queue]
# Minutes between published postings (changeable later with `trickle interval`)
interval_minutes = 30

# Manual retries allowed per failed item
max_retries = 3

# How often the daemon checks for a due item
tick_interval = "1m"

# Priority for links queued by hand (0-10)
manual_priority = 5

[discovery]
scan_interval = "1h"
deep_scan_interval = "24h"

# Pages walked per source on quick and deep scans
quick_pages = 2
deep_pages = 20

# Stop paging a source after this many known links in a row
streak_limit = 5

# Listing pages use {page} in the URL for pagination:
#
# [[discovery.sources]]
# kind = "listing"
# name = "example-board"
# url = "https://jobs.example.com/openings?page={page}"
# link_selector = "a.job-card"
# filter = "/openings/"
#
# [[discovery.sources]]
# kind = "feed"
# name = "example-feed"
# url = "https://blog.example.com/careers/feed.xml"

[notify]
# telegram_token = "123456:ABC..."
telegram_chat_ids = []
webhook_urls = []
# site_base_url = "https://jobs.example.com"
timeout_secs = 15
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
