use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TrickleError};
use crate::domain::{JobPosting, WorkItem, WorkStatus};
use crate::store::{Store, CLAIM_LEASE_MINUTES};

const POSTING_COLUMNS: &str = "id, title, company, location, eligibility, salary, description, \
     apply_url, source_url, company_logo, category, tags, batch, job_type, role_type, seniority, \
     min_salary, is_remote, is_active, created_at, updated_at";

const WORK_ITEM_COLUMNS: &str = "id, source_url, status, scheduled_for, priority, retry_count, \
     max_retries, source, last_error, posting_id, claimed_at, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        migrations
            .to_latest(&mut conn)
            .map_err(|e| TrickleError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TrickleError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Fixed-width UTC timestamps so that string ordering matches time ordering.
    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Claims taken before this are stale.
    fn lease_cutoff(now: &DateTime<Utc>) -> String {
        Self::format_datetime(&(*now - Duration::minutes(CLAIM_LEASE_MINUTES)))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn required_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        Ok(row
            .get::<_, String>(idx)
            .ok()
            .and_then(|s| Self::parse_datetime(&s))
            .unwrap_or_else(Utc::now))
    }

    fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
        let raw: String = row.get(idx)?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn posting_from_row(row: &Row<'_>) -> rusqlite::Result<JobPosting> {
        Ok(JobPosting {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            eligibility: row.get(4)?,
            salary: row.get(5)?,
            description: row.get(6)?,
            apply_url: row.get(7)?,
            source_url: row.get(8)?,
            company_logo: row.get(9)?,
            category: row.get(10)?,
            tags: Self::json_list(row, 11)?,
            batch: Self::json_list(row, 12)?,
            job_type: row.get(13)?,
            role_type: row.get(14)?,
            seniority: row.get(15)?,
            min_salary: row.get(16)?,
            is_remote: row.get(17)?,
            is_active: row.get(18)?,
            created_at: Self::required_datetime(row, 19)?,
            updated_at: Self::required_datetime(row, 20)?,
        })
    }

    fn work_item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
        let status: String = row.get(2)?;
        Ok(WorkItem {
            id: row.get(0)?,
            source_url: row.get(1)?,
            status: status.parse().unwrap_or(WorkStatus::Failed),
            scheduled_for: Self::required_datetime(row, 3)?,
            priority: row.get(4)?,
            retry_count: row.get(5)?,
            max_retries: row.get(6)?,
            source: row.get(7)?,
            last_error: row.get(8)?,
            posting_id: row.get(9)?,
            claimed_at: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| Self::parse_datetime(&s)),
            created_at: Self::required_datetime(row, 11)?,
            updated_at: Self::required_datetime(row, 12)?,
        })
    }

    fn now() -> String {
        Self::format_datetime(&Utc::now())
    }
}

impl Store for SqliteStore {
    fn upsert_posting(&self, posting: &JobPosting) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            &format!(
                "INSERT INTO postings ({POSTING_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    company = excluded.company,
                    location = excluded.location,
                    eligibility = excluded.eligibility,
                    salary = excluded.salary,
                    description = excluded.description,
                    apply_url = excluded.apply_url,
                    company_logo = excluded.company_logo,
                    category = excluded.category,
                    tags = excluded.tags,
                    batch = excluded.batch,
                    job_type = excluded.job_type,
                    role_type = excluded.role_type,
                    seniority = excluded.seniority,
                    min_salary = excluded.min_salary,
                    is_remote = excluded.is_remote,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at"
            ),
            params![
                posting.id,
                posting.title,
                posting.company,
                posting.location,
                posting.eligibility,
                posting.salary,
                posting.description,
                posting.apply_url,
                posting.source_url,
                posting.company_logo,
                posting.category,
                serde_json::to_string(&posting.tags)?,
                serde_json::to_string(&posting.batch)?,
                posting.job_type,
                posting.role_type,
                posting.seniority,
                posting.min_salary,
                posting.is_remote,
                posting.is_active,
                Self::format_datetime(&posting.created_at),
                Self::format_datetime(&posting.updated_at),
            ],
        )?;

        Ok(())
    }

    fn get_posting(&self, id: &str) -> Result<Option<JobPosting>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!("SELECT {POSTING_COLUMNS} FROM postings WHERE id = ?1"),
                params![id],
                Self::posting_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn find_posting_by_url(&self, url: &str) -> Result<Option<JobPosting>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {POSTING_COLUMNS} FROM postings
                     WHERE source_url = ?1 OR apply_url = ?1
                     LIMIT 1"
                ),
                params![url],
                Self::posting_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn find_active_by_title(&self, title: &str) -> Result<Vec<JobPosting>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings
             WHERE is_active = 1 AND lower(trim(title)) = lower(trim(?1))"
        ))?;

        let postings = stmt
            .query_map(params![title], Self::posting_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(postings)
    }

    fn list_postings(&self, limit: usize) -> Result<Vec<JobPosting>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings ORDER BY created_at DESC LIMIT ?1"
        ))?;

        let postings = stmt
            .query_map(params![limit as i64], Self::posting_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(postings)
    }

    fn set_posting_active(&self, id: &str, is_active: bool) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE postings SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active, Self::now(), id],
        )?;

        if updated == 0 {
            return Err(TrickleError::NotFound(format!("posting {}", id)));
        }
        Ok(())
    }

    fn insert_work_item(&self, item: &WorkItem) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO work_items
                (source_url, status, scheduled_for, priority, retry_count, max_retries, source,
                 last_error, posting_id, claimed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                item.source_url,
                item.status.as_str(),
                Self::format_datetime(&item.scheduled_for),
                item.priority,
                item.retry_count,
                item.max_retries,
                item.source,
                item.last_error,
                item.posting_id,
                item.claimed_at.as_ref().map(Self::format_datetime),
                Self::format_datetime(&item.created_at),
                Self::format_datetime(&item.updated_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_work_item(&self, id: i64) -> Result<Option<WorkItem>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE id = ?1"),
                params![id],
                Self::work_item_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_work_items(&self, status: Option<WorkStatus>) -> Result<Vec<WorkItem>> {
        let conn = self.lock()?;

        let items = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {WORK_ITEM_COLUMNS} FROM work_items
                     WHERE status = ?1 ORDER BY scheduled_for, id"
                ))?;
                let rows = stmt
                    .query_map(params![status.as_str()], Self::work_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {WORK_ITEM_COLUMNS} FROM work_items ORDER BY scheduled_for, id"
                ))?;
                let rows = stmt
                    .query_map([], Self::work_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(items)
    }

    fn last_pending_scheduled_for(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;

        let latest: Option<String> = conn.query_row(
            "SELECT MAX(scheduled_for) FROM work_items WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )?;

        Ok(latest.and_then(|s| Self::parse_datetime(&s)))
    }

    fn pending_url_exists(&self, url: &str) -> Result<bool> {
        let conn = self.lock()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM work_items WHERE status = 'pending' AND source_url = ?1)",
            params![url],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    fn next_due_item(&self, now: DateTime<Utc>) -> Result<Option<WorkItem>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {WORK_ITEM_COLUMNS} FROM work_items
                     WHERE status = 'pending' AND scheduled_for <= ?1
                       AND (claimed_at IS NULL OR claimed_at < ?2)
                     ORDER BY scheduled_for ASC, priority DESC, id ASC
                     LIMIT 1"
                ),
                params![Self::format_datetime(&now), Self::lease_cutoff(&now)],
                Self::work_item_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn claim_work_item(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;

        let ts = Self::format_datetime(&now);
        let updated = conn.execute(
            "UPDATE work_items SET claimed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND status = 'pending'
               AND (claimed_at IS NULL OR claimed_at < ?3)",
            params![ts, id, Self::lease_cutoff(&now)],
        )?;

        Ok(updated == 1)
    }

    fn release_claim(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE work_items SET claimed_at = NULL, updated_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![Self::now(), id],
        )?;

        Ok(())
    }

    fn mark_processed(&self, id: i64, posting_id: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE work_items
             SET status = 'processed', posting_id = ?1, last_error = NULL, claimed_at = NULL,
                 updated_at = ?2
             WHERE id = ?3",
            params![posting_id, Self::now(), id],
        )?;

        Ok(())
    }

    fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE work_items
             SET status = 'failed', last_error = ?1, claimed_at = NULL, updated_at = ?2
             WHERE id = ?3",
            params![error, Self::now(), id],
        )?;

        Ok(())
    }

    fn reset_for_retry(&self, id: i64, scheduled_for: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE work_items
             SET status = 'pending', retry_count = retry_count + 1, claimed_at = NULL,
                 scheduled_for = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'failed' AND retry_count < max_retries",
            params![Self::format_datetime(&scheduled_for), Self::now(), id],
        )?;

        Ok(updated == 1)
    }

    fn delete_work_item(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn.execute("DELETE FROM work_items WHERE id = ?1", params![id])?;
        Ok(deleted == 1)
    }

    fn count_work_items(&self) -> Result<Vec<(WorkStatus, i64)>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM work_items GROUP BY status ORDER BY status")?;

        let counts = stmt
            .query_map([], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(status, count)| status.parse::<WorkStatus>().ok().map(|s| (s, count)))
            .collect();

        Ok(counts)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;

        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Self::now()],
        )?;

        Ok(())
    }
}
