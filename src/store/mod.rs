pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::settings::{INTERVAL_MINUTES_KEY, QUEUE_PAUSED_KEY};
use crate::domain::{JobPosting, Settings, WorkItem, WorkStatus};

pub use sqlite::SqliteStore;

/// Minutes a claim holds. A processor that dies between claiming an item and
/// recording its outcome leaves the claim behind; once it is this old the
/// item is due again.
pub const CLAIM_LEASE_MINUTES: i64 = 30;

/// Store handle shared by the pipeline, queue, discovery and daemon timers.
pub type SharedStore = Arc<dyn Store + Send + Sync>;

/// The shared datastore. Several timers and manual triggers mutate it without
/// cross-operation transactions, so every write is an idempotent upsert or a
/// conditional update.
pub trait Store {
    // Posting operations
    fn upsert_posting(&self, posting: &JobPosting) -> Result<()>;
    fn get_posting(&self, id: &str) -> Result<Option<JobPosting>>;
    /// Matches either the stored source URL or apply URL.
    fn find_posting_by_url(&self, url: &str) -> Result<Option<JobPosting>>;
    /// Active postings whose title equals `title`, ignoring case.
    fn find_active_by_title(&self, title: &str) -> Result<Vec<JobPosting>>;
    fn list_postings(&self, limit: usize) -> Result<Vec<JobPosting>>;
    fn set_posting_active(&self, id: &str, is_active: bool) -> Result<()>;

    // Work item operations
    fn insert_work_item(&self, item: &WorkItem) -> Result<i64>;
    fn get_work_item(&self, id: i64) -> Result<Option<WorkItem>>;
    fn list_work_items(&self, status: Option<WorkStatus>) -> Result<Vec<WorkItem>>;
    fn last_pending_scheduled_for(&self) -> Result<Option<DateTime<Utc>>>;
    fn pending_url_exists(&self, url: &str) -> Result<bool>;
    /// Pending items whose claim is older than the lease count as unclaimed.
    fn next_due_item(&self, now: DateTime<Utc>) -> Result<Option<WorkItem>>;
    /// Atomically marks a pending item as taken. Returns false if another
    /// processor holds a live claim.
    fn claim_work_item(&self, id: i64, now: DateTime<Utc>) -> Result<bool>;
    /// Drops the claim on a pending item so the next tick can take it.
    fn release_claim(&self, id: i64) -> Result<()>;
    fn mark_processed(&self, id: i64, posting_id: &str) -> Result<()>;
    fn mark_failed(&self, id: i64, error: &str) -> Result<()>;
    /// Moves a failed item back to pending and bumps its retry count, unless
    /// the retry budget is spent.
    fn reset_for_retry(&self, id: i64, scheduled_for: DateTime<Utc>) -> Result<bool>;
    fn delete_work_item(&self, id: i64) -> Result<bool>;
    fn count_work_items(&self) -> Result<Vec<(WorkStatus, i64)>>;

    // Settings
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    fn load_settings(&self) -> Result<Settings> {
        let defaults = Settings::default();
        let queue_paused = self
            .get_setting(QUEUE_PAUSED_KEY)?
            .map(|v| Settings::parse_bool(&v))
            .unwrap_or(defaults.queue_paused);
        let interval_minutes = self
            .get_setting(INTERVAL_MINUTES_KEY)?
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(defaults.interval_minutes);

        Ok(Settings {
            queue_paused,
            interval_minutes,
        })
    }
}
