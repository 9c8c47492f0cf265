use std::fmt;
use std::sync::Arc;

use crate::dedup::DuplicateStreak;
use crate::discovery::{DiscoveryConfig, DiscoverySource};
use crate::domain::{Failure, Outcome};
use crate::queue::ScheduleQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDepth {
    /// The first few pages of each source, run hourly
    Quick,
    /// Deep import, run daily or on demand
    Deep,
}

impl fmt::Display for ScanDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanDepth::Quick => f.write_str("quick"),
            ScanDepth::Deep => f.write_str("deep"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub pages: u32,
    pub discovered: usize,
    pub queued: usize,
    pub duplicates: usize,
    pub stopped_by_streak: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    pub sources: Vec<SourceReport>,
}

impl ScanReport {
    pub fn queued(&self) -> usize {
        self.sources.iter().map(|s| s.queued).sum()
    }

    pub fn discovered(&self) -> usize {
        self.sources.iter().map(|s| s.discovered).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.sources.iter().map(|s| s.duplicates).sum()
    }

    pub fn errors(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

pub struct DiscoveryScanner {
    sources: Vec<Arc<dyn DiscoverySource>>,
    queue: Arc<ScheduleQueue>,
    quick_pages: u32,
    deep_pages: u32,
    streak_limit: usize,
    priority: u8,
}

impl DiscoveryScanner {
    pub fn new(
        sources: Vec<Arc<dyn DiscoverySource>>,
        queue: Arc<ScheduleQueue>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            sources,
            queue,
            quick_pages: config.quick_pages.max(1),
            deep_pages: config.deep_pages.max(1),
            streak_limit: config.streak_limit,
            priority: config.priority,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Walk every source once. A failing source is logged and reported; it
    /// never stops the others.
    pub async fn scan(&self, depth: ScanDepth) -> ScanReport {
        let page_limit = match depth {
            ScanDepth::Quick => self.quick_pages,
            ScanDepth::Deep => self.deep_pages,
        };
        tracing::info!(%depth, sources = self.sources.len(), "Starting discovery scan");

        let mut report = ScanReport::default();
        for source in &self.sources {
            let source_report = self.scan_source(source.as_ref(), page_limit).await;
            tracing::info!(
                source = %source_report.name,
                pages = source_report.pages,
                discovered = source_report.discovered,
                queued = source_report.queued,
                duplicates = source_report.duplicates,
                "Source scanned"
            );
            report.sources.push(source_report);
        }

        tracing::info!(
            %depth,
            queued = report.queued(),
            duplicates = report.duplicates(),
            errors = report.errors(),
            "Discovery scan finished"
        );
        report
    }

    async fn scan_source(&self, source: &dyn DiscoverySource, page_limit: u32) -> SourceReport {
        let mut report = SourceReport {
            name: source.name().to_string(),
            ..Default::default()
        };
        let mut streak = DuplicateStreak::new(self.streak_limit);
        let last_page = if source.paginated() { page_limit } else { 1 };

        'pages: for page in 1..=last_page {
            let links = match source.fetch_page(page).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!(source = %report.name, page, "Discovery fetch failed: {}", e);
                    report.error = Some(e.to_string());
                    break;
                }
            };
            report.pages = page;
            if links.is_empty() {
                break;
            }

            for link in links {
                report.discovered += 1;
                match self.queue.enqueue(&link, &report.name, self.priority) {
                    Ok(Outcome::Done(_)) => {
                        report.queued += 1;
                        streak.record_new();
                    }
                    Ok(Outcome::Failed(Failure::Duplicate(_))) => {
                        report.duplicates += 1;
                        if streak.record_duplicate() && source.paginated() {
                            tracing::info!(
                                source = %report.name,
                                page,
                                "{} known links in a row, stopping",
                                streak.current()
                            );
                            report.stopped_by_streak = true;
                            break 'pages;
                        }
                    }
                    Ok(other) => {
                        tracing::debug!(url = %link, "Ignored: {:?}", other.reason());
                    }
                    Err(e) => {
                        tracing::error!(source = %report.name, "Failed to queue {}: {}", link, e);
                        report.error = Some(e.to_string());
                        break 'pages;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Result, TrickleError};
    use crate::store::sqlite::tests::sample_posting;
    use crate::store::{SqliteStore, Store};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Pages of links served in order; records which pages were asked for.
    struct PagedSource {
        name: &'static str,
        pages: Vec<Vec<String>>,
        paginated: bool,
        fail: bool,
        requested: Mutex<Vec<u32>>,
    }

    impl PagedSource {
        fn new(name: &'static str, pages: Vec<Vec<String>>) -> Self {
            Self {
                name,
                pages,
                paginated: true,
                fail: false,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DiscoverySource for PagedSource {
        fn name(&self) -> &str {
            self.name
        }

        fn paginated(&self) -> bool {
            self.paginated
        }

        async fn fetch_page(&self, page: u32) -> Result<Vec<String>> {
            self.requested.lock().unwrap().push(page);
            if self.fail {
                return Err(TrickleError::Scraper("HTTP 503".into()));
            }
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn link(n: usize) -> String {
        format!("https://board.example/jobs/{}", n)
    }

    fn scanner(
        sources: Vec<Arc<dyn DiscoverySource>>,
    ) -> (Arc<SqliteStore>, DiscoveryScanner) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let queue = Arc::new(ScheduleQueue::new(store.clone()));
        let config = DiscoveryConfig {
            deep_pages: 10,
            ..Default::default()
        };
        (store, DiscoveryScanner::new(sources, queue, &config))
    }

    #[tokio::test]
    async fn test_streak_of_known_links_stops_paging() {
        // One link per page; the first five are already published.
        let source = Arc::new(PagedSource::new(
            "board",
            (1..=10).map(|n| vec![link(n)]).collect(),
        ));
        let (store, scanner) = scanner(vec![source.clone() as Arc<dyn DiscoverySource>]);
        for n in 1..=5 {
            store
                .upsert_posting(&sample_posting(&link(n), &format!("Job {}", n), "Acme"))
                .unwrap();
        }

        let report = scanner.scan(ScanDepth::Deep).await;

        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5]);
        let board = &report.sources[0];
        assert!(board.stopped_by_streak);
        assert_eq!(board.duplicates, 5);
        assert_eq!(board.queued, 0);
    }

    #[tokio::test]
    async fn test_new_link_resets_streak() {
        let mut pages: Vec<Vec<String>> = vec![(1..=4).map(link).collect()];
        pages.push(vec![link(100)]);
        pages.push((5..=8).map(link).collect());
        pages.push(vec![link(101)]);
        let source = Arc::new(PagedSource::new("board", pages));
        let (store, scanner) = scanner(vec![source.clone() as Arc<dyn DiscoverySource>]);
        for n in 1..=8 {
            store
                .upsert_posting(&sample_posting(&link(n), &format!("Job {}", n), "Acme"))
                .unwrap();
        }

        let report = scanner.scan(ScanDepth::Deep).await;

        // Page 5 is empty, ending the walk
        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5]);
        assert_eq!(report.queued(), 2);
        assert_eq!(report.duplicates(), 8);
        assert!(!report.sources[0].stopped_by_streak);
    }

    #[tokio::test]
    async fn test_quick_scan_page_limit() {
        let source = Arc::new(PagedSource::new(
            "board",
            (1..=10).map(|n| vec![link(n)]).collect(),
        ));
        let (store, scanner) = scanner(vec![source.clone() as Arc<dyn DiscoverySource>]);

        let report = scanner.scan(ScanDepth::Quick).await;

        assert_eq!(source.requested(), vec![1, 2]);
        assert_eq!(report.queued(), 2);
        assert_eq!(store.list_work_items(None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_stop_scan() {
        let mut broken = PagedSource::new("broken", vec![]);
        broken.fail = true;
        let healthy = Arc::new(PagedSource::new("healthy", vec![vec![link(1), link(2)]]));
        let (_, scanner) = scanner(vec![
            Arc::new(broken) as Arc<dyn DiscoverySource>,
            healthy.clone(),
        ]);

        let report = scanner.scan(ScanDepth::Quick).await;

        assert_eq!(report.errors(), 1);
        assert_eq!(report.sources[0].error.as_deref(), Some("Scraper error: HTTP 503"));
        assert_eq!(report.sources[1].queued, 2);
    }

    #[tokio::test]
    async fn test_unpaginated_source_read_once() {
        let mut feed = PagedSource::new("feed", vec![vec![link(1)], vec![link(2)]]);
        feed.paginated = false;
        let feed = Arc::new(feed);
        let (_, scanner) = scanner(vec![feed.clone() as Arc<dyn DiscoverySource>]);

        let report = scanner.scan(ScanDepth::Deep).await;

        assert_eq!(feed.requested(), vec![1]);
        assert_eq!(report.queued(), 1);
    }
}
