//! The drip-feed queue.
//!
//! New links are spaced `interval` apart after the last pending item, so a
//! burst of discovered links is published at a steady pace. Items move
//! `pending → processed` or `pending → failed`; only [`ScheduleQueue::retry`]
//! moves a failed item back to pending.

pub mod processor;

pub use processor::{QueueProcessor, TickReport};

use chrono::{DateTime, Utc};

use crate::app::{Result, TrickleError};
use crate::dedup::{normalize_url, DedupEngine};
use crate::domain::work_item::DEFAULT_MAX_RETRIES;
use crate::domain::{Failure, Outcome, WorkItem, WorkStatus};
use crate::store::SharedStore;

pub struct ScheduleQueue {
    store: SharedStore,
    dedup: DedupEngine,
    max_retries: u32,
}

#[derive(Debug, Default)]
pub struct EnqueueReport {
    pub queued: Vec<WorkItem>,
    /// Links not queued, with the reason
    pub rejected: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: i64,
    pub processed: i64,
    pub failed: i64,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.pending + self.processed + self.failed
    }
}

impl ScheduleQueue {
    pub fn new(store: SharedStore) -> Self {
        Self {
            dedup: DedupEngine::new(store.clone()),
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The time the next appended item should run: `max(now, last pending) + interval`.
    pub fn next_slot(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let interval = self.store.load_settings()?.interval();
        let base = match self.store.last_pending_scheduled_for()? {
            Some(last) if last > now => last,
            _ => now,
        };
        Ok(base + interval)
    }

    pub fn enqueue(&self, url: &str, source: &str, priority: u8) -> Result<Outcome<WorkItem>> {
        self.enqueue_at(url, source, priority, Utc::now())
    }

    /// Queue a link unless it is malformed or already known.
    pub fn enqueue_at(
        &self,
        url: &str,
        source: &str,
        priority: u8,
        now: DateTime<Utc>,
    ) -> Result<Outcome<WorkItem>> {
        let Some(url) = normalize_url(url) else {
            return Ok(Outcome::skipped("invalid url"));
        };

        if let Some(reason) = self.dedup.pre_scrape(&url)? {
            tracing::debug!(url = %url, "Not queued: {}", reason);
            return Ok(Failure::Duplicate(reason).into());
        }

        let mut item = WorkItem::new(url, source, self.next_slot(now)?)
            .with_priority(priority)
            .with_max_retries(self.max_retries);
        item.id = self.store.insert_work_item(&item)?;

        tracing::info!(
            item_id = item.id,
            url = %item.source_url,
            scheduled_for = %item.scheduled_for,
            "Queued"
        );
        Ok(Outcome::Done(item))
    }

    pub fn enqueue_many(&self, urls: &[String], source: &str, priority: u8) -> Result<EnqueueReport> {
        let mut report = EnqueueReport::default();
        for url in urls {
            match self.enqueue(url, source, priority)? {
                Outcome::Done(item) => report.queued.push(item),
                other => {
                    let reason = other.reason().unwrap_or_default();
                    report.rejected.push((url.clone(), reason));
                }
            }
        }
        Ok(report)
    }

    pub fn get(&self, id: i64) -> Result<WorkItem> {
        self.store
            .get_work_item(id)?
            .ok_or_else(|| TrickleError::NotFound(format!("work item {}", id)))
    }

    /// Put a failed item back in line at the end of the queue.
    pub fn retry(&self, id: i64) -> Result<WorkItem> {
        let item = self.get(id)?;
        if item.status != WorkStatus::Failed {
            return Err(TrickleError::Other(format!(
                "work item {} is {}, only failed items can be retried",
                id, item.status
            )));
        }
        if !item.can_retry() {
            return Err(TrickleError::RetryExhausted {
                id,
                max_retries: item.max_retries,
            });
        }

        let scheduled_for = self.next_slot(Utc::now())?;
        if !self.store.reset_for_retry(id, scheduled_for)? {
            return Err(TrickleError::RetryExhausted {
                id,
                max_retries: item.max_retries,
            });
        }

        tracing::info!(item_id = id, scheduled_for = %scheduled_for, "Retry scheduled");
        self.get(id)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        if self.store.delete_work_item(id)? {
            tracing::info!(item_id = id, "Deleted work item");
            Ok(())
        } else {
            Err(TrickleError::NotFound(format!("work item {}", id)))
        }
    }

    pub fn list(&self, status: Option<WorkStatus>) -> Result<Vec<WorkItem>> {
        self.store.list_work_items(status)
    }

    pub fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for (status, count) in self.store.count_work_items()? {
            match status {
                WorkStatus::Pending => stats.pending = count,
                WorkStatus::Processed => stats.processed = count,
                WorkStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::INTERVAL_MINUTES_KEY;
    use crate::store::sqlite::tests::sample_posting;
    use crate::store::{SqliteStore, Store};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn queue(interval_minutes: u32) -> (Arc<SqliteStore>, ScheduleQueue) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .set_setting(INTERVAL_MINUTES_KEY, &interval_minutes.to_string())
            .unwrap();
        let queue = ScheduleQueue::new(store.clone());
        (store, queue)
    }

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_sequential_enqueue_spaced_by_interval() {
        let (_, queue) = queue(30);
        let now = nine_am();

        let times: Vec<DateTime<Utc>> = (0..4)
            .map(|i| {
                queue
                    .enqueue_at(&format!("https://ex.com/job/{}", i), "manual", 0, now)
                    .unwrap()
                    .done()
                    .unwrap()
                    .scheduled_for
            })
            .collect();

        assert_eq!(times[0], now + Duration::minutes(30));
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(30));
        }
    }

    #[test]
    fn test_spacing_restarts_from_now_when_queue_is_stale() {
        let (_, queue) = queue(10);
        let earlier = nine_am();
        queue.enqueue_at("https://ex.com/a", "manual", 0, earlier).unwrap();

        let later = earlier + Duration::hours(5);
        let item = queue
            .enqueue_at("https://ex.com/b", "manual", 0, later)
            .unwrap()
            .done()
            .unwrap();
        assert_eq!(item.scheduled_for, later + Duration::minutes(10));
    }

    #[test]
    fn test_known_links_never_queued() {
        let (store, queue) = queue(30);
        store
            .upsert_posting(&sample_posting("https://ex.com/job/1", "Engineer", "Acme"))
            .unwrap();

        let by_source = queue.enqueue("https://ex.com/job/1", "scan", 0).unwrap();
        let by_apply = queue.enqueue("https://ex.com/job/1/apply", "scan", 0).unwrap();
        assert!(matches!(by_source, Outcome::Failed(Failure::Duplicate(_))));
        assert!(matches!(by_apply, Outcome::Failed(Failure::Duplicate(_))));

        assert!(queue.enqueue("https://ex.com/job/2", "scan", 0).unwrap().is_done());
        assert!(!queue.enqueue("https://ex.com/job/2#top", "scan", 0).unwrap().is_done());
        assert_eq!(queue.stats().unwrap().pending, 1);
    }

    #[test]
    fn test_bare_host_apply_link_never_queued() {
        let (store, queue) = queue(30);
        let mut posting = sample_posting("https://ex.com/job/9", "Engineer", "Acme");
        posting.apply_url = "https://careers.acme.com".into();
        store.upsert_posting(&posting).unwrap();

        for link in ["https://careers.acme.com", "https://careers.acme.com/", "https://Careers.Acme.com"] {
            let outcome = queue.enqueue(link, "scan", 0).unwrap();
            assert!(
                matches!(outcome, Outcome::Failed(Failure::Duplicate(_))),
                "{} was queued",
                link
            );
        }
        assert_eq!(queue.stats().unwrap().total(), 0);
    }

    #[test]
    fn test_invalid_urls_skipped() {
        let (_, queue) = queue(30);
        for bad in ["not a url", "ftp://ex.com/file", "mailto:jobs@ex.com"] {
            assert_eq!(
                queue.enqueue(bad, "manual", 0).unwrap(),
                Outcome::skipped("invalid url")
            );
        }
        assert_eq!(queue.stats().unwrap().total(), 0);
    }

    #[test]
    fn test_enqueue_many_reports_rejections() {
        let (_, queue) = queue(30);
        let urls = vec![
            "https://ex.com/1".to_string(),
            "https://ex.com/1".to_string(),
            "nope".to_string(),
        ];
        let report = queue.enqueue_many(&urls, "import", 3).unwrap();
        assert_eq!(report.queued.len(), 1);
        assert_eq!(report.queued[0].priority, 3);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[1].1, "skipped: invalid url");
    }

    #[test]
    fn test_retry_moves_failed_item_back() {
        let (store, queue) = queue(30);
        let item = queue
            .enqueue("https://ex.com/job/1", "manual", 0)
            .unwrap()
            .done()
            .unwrap();

        assert!(matches!(queue.retry(item.id), Err(TrickleError::Other(_))));

        store.mark_failed(item.id, "network failure: reset").unwrap();
        let retried = queue.retry(item.id).unwrap();
        assert_eq!(retried.status, WorkStatus::Pending);
        assert_eq!(retried.retry_count, 1);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let (store, queue) = queue(30);
        let queue = queue.with_max_retries(1);
        let item = queue
            .enqueue("https://ex.com/job/1", "manual", 0)
            .unwrap()
            .done()
            .unwrap();

        store.mark_failed(item.id, "x").unwrap();
        queue.retry(item.id).unwrap();
        store.mark_failed(item.id, "x").unwrap();

        let err = queue.retry(item.id).unwrap_err();
        assert!(matches!(err, TrickleError::RetryExhausted { max_retries: 1, .. }));
    }

    #[test]
    fn test_delete_and_stats() {
        let (store, queue) = queue(30);
        let a = queue.enqueue("https://ex.com/a", "manual", 0).unwrap().done().unwrap();
        let b = queue.enqueue("https://ex.com/b", "manual", 0).unwrap().done().unwrap();
        store.mark_failed(b.id, "x").unwrap();

        assert_eq!(
            queue.stats().unwrap(),
            QueueStats {
                pending: 1,
                processed: 0,
                failed: 1
            }
        );

        queue.delete(a.id).unwrap();
        assert!(matches!(queue.delete(a.id), Err(TrickleError::NotFound(_))));
        assert_eq!(queue.list(Some(WorkStatus::Pending)).unwrap().len(), 0);
    }
}
