use std::path::PathBuf;
use std::sync::Arc;

use crate::ai::{JobAi, OpenAiClient};
use crate::app::error::{Result, TrickleError};
use crate::config::Config;
use crate::discovery::{build_sources, DiscoveryScanner};
use crate::domain::settings::INTERVAL_MINUTES_KEY;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::notify::FanOut;
use crate::pipeline::Pipeline;
use crate::queue::{QueueProcessor, ScheduleQueue};
use crate::scraper::{ChromeRenderer, DisabledRenderer, PageScraper, Renderer};
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Every component, wired at construction time.
///
/// The store, fetcher and queue are always available. The pipeline needs an
/// AI key, so it is built on demand and commands that only touch the queue
/// work without one.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub queue: Arc<ScheduleQueue>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.database {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };
        let store = Arc::new(SqliteStore::new(&db_path)?);
        tracing::debug!(db = %db_path.display(), "Opened datastore");
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_store(config, Arc::new(SqliteStore::in_memory()?))
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        // The file value seeds the runtime setting once; after that the
        // datastore is authoritative.
        if store.get_setting(INTERVAL_MINUTES_KEY)?.is_none() {
            store.set_setting(
                INTERVAL_MINUTES_KEY,
                &config.queue.interval_minutes.max(1).to_string(),
            )?;
        }

        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
            &config.scraper.user_agent,
            config.scraper.fetch_timeout(),
        )?);
        let queue = Arc::new(
            ScheduleQueue::new(store.clone()).with_max_retries(config.queue.max_retries),
        );

        Ok(Self {
            config,
            store,
            fetcher,
            queue,
        })
    }

    pub fn pipeline(&self) -> Result<Arc<Pipeline>> {
        let renderer: Arc<dyn Renderer> = if self.config.scraper.render_fallback {
            Arc::new(ChromeRenderer::new(self.config.scraper.clone()))
        } else {
            Arc::new(DisabledRenderer)
        };
        let adapter = Arc::new(PageScraper::new(
            self.config.scraper.clone(),
            self.fetcher.clone(),
            renderer,
        ));
        let ai: Arc<dyn JobAi> = Arc::new(OpenAiClient::new(self.config.ai.clone())?);
        let notifier = Arc::new(FanOut::from_config(&self.config.notify)?);
        if notifier.is_empty() {
            tracing::info!("No notification channels configured");
        }

        Ok(Arc::new(Pipeline::new(
            adapter,
            ai,
            self.store.clone(),
            notifier,
        )))
    }

    pub fn processor(&self) -> Result<Arc<QueueProcessor>> {
        Ok(Arc::new(QueueProcessor::new(
            self.store.clone(),
            self.pipeline()?,
        )))
    }

    pub fn scanner(&self) -> Result<Arc<DiscoveryScanner>> {
        let sources = build_sources(&self.config.discovery.sources, self.fetcher.clone())?;
        Ok(Arc::new(DiscoveryScanner::new(
            sources,
            self.queue.clone(),
            &self.config.discovery,
        )))
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TrickleError::Config("Could not find data directory".into()))?;
        let trickle_dir = data_dir.join("trickle");
        std::fs::create_dir_all(&trickle_dir)?;
        Ok(trickle_dir.join("trickle.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceConfig;
    use tempfile::TempDir;

    #[test]
    fn test_interval_seeded_once() {
        let mut config = Config::default();
        config.queue.interval_minutes = 12;
        let ctx = AppContext::in_memory(config).unwrap();
        assert_eq!(ctx.store.load_settings().unwrap().interval_minutes, 12);

        ctx.store.set_setting(INTERVAL_MINUTES_KEY, "45").unwrap();
        let again = AppContext::with_store(Config::default(), ctx.store.clone()).unwrap();
        assert_eq!(again.store.load_settings().unwrap().interval_minutes, 45);
    }

    #[test]
    fn test_pipeline_requires_api_key() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        assert!(matches!(ctx.pipeline(), Err(TrickleError::Config(_))));

        let mut config = Config::default();
        config.ai.api_key = Some("sk-test".into());
        config.scraper.render_fallback = false;
        let ctx = AppContext::in_memory(config).unwrap();
        assert!(ctx.processor().is_ok());
    }

    #[test]
    fn test_scanner_from_config() {
        let mut config = Config::default();
        config.discovery.sources.push(SourceConfig::Feed {
            name: "feed".into(),
            url: "https://jobs.example.com/feed.xml".into(),
            filter: None,
        });
        let ctx = AppContext::in_memory(config).unwrap();
        assert_eq!(ctx.scanner().unwrap().source_count(), 1);
    }

    #[test]
    fn test_on_disk_database() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database = Some(dir.path().join("trickle.db"));

        let ctx = AppContext::new(config).unwrap();
        ctx.queue.enqueue("https://ex.com/job/1", "manual", 0).unwrap();
        assert!(dir.path().join("trickle.db").exists());
    }
}
