//! Duplicate detection at three checkpoints, cheapest first:
//!
//! 1. pre-scrape: the link (or its query-stripped form) is already a posting
//!    or already queued
//! 2. post-scrape: the scraped title and company match an active posting
//! 3. post-finalize: the same check on the finished record
//!
//! Plus [`DuplicateStreak`], which stops paginated discovery once a source
//! keeps returning links we already know.

use url::Url;

use crate::app::Result;
use crate::domain::JobPosting;
use crate::store::SharedStore;

pub const DEFAULT_STREAK_LIMIT: usize = 5;

pub struct DedupEngine {
    store: SharedStore,
}

impl DedupEngine {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Checkpoint 1, before a link is queued. Returns the reason when the
    /// link is already a posting or already waiting in the queue.
    pub fn pre_scrape(&self, url: &str) -> Result<Option<String>> {
        if let Some(reason) = self.published_link(url)? {
            return Ok(Some(reason));
        }
        for candidate in url_forms(url) {
            if self.store.pending_url_exists(&candidate)? {
                return Ok(Some(format!("already queued: {}", candidate)));
            }
        }
        Ok(None)
    }

    /// Checkpoint 1 for an item already in the queue: only existing postings
    /// count, since the item's own pending row would otherwise match.
    pub fn published_link(&self, url: &str) -> Result<Option<String>> {
        for candidate in url_forms(url) {
            if let Some(posting) = self.store.find_posting_by_url(&candidate)? {
                return Ok(Some(format!(
                    "link already published as \"{}\" ({})",
                    posting.title,
                    posting.short_id()
                )));
            }
        }
        Ok(None)
    }

    /// Checkpoint 2. Without a company there is nothing reliable to compare,
    /// so the check passes.
    pub fn post_scrape(&self, title: &str, company: Option<&str>) -> Result<Option<String>> {
        match company {
            Some(company) if !company.trim().is_empty() => self.title_company_clash(title, company, None),
            _ => Ok(None),
        }
    }

    /// Checkpoint 3. A posting never clashes with its own earlier version.
    pub fn post_finalize(&self, posting: &JobPosting) -> Result<Option<String>> {
        self.title_company_clash(&posting.title, &posting.company, Some(&posting.id))
    }

    fn title_company_clash(
        &self,
        title: &str,
        company: &str,
        exclude_id: Option<&str>,
    ) -> Result<Option<String>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let clash = self
            .store
            .find_active_by_title(title)?
            .into_iter()
            .filter(|existing| Some(existing.id.as_str()) != exclude_id)
            .find(|existing| companies_match(&existing.company, company));

        Ok(clash.map(|existing| {
            format!(
                "\"{}\" at {} already posted ({})",
                existing.title,
                existing.company,
                existing.short_id()
            )
        }))
    }
}

/// Case-insensitive containment in either direction ("Acme" vs "Acme Inc").
pub fn companies_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Trimmed http(s) URL without its fragment. Host is lowercased and a bare
/// host gains a trailing `/`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Every spelling of a link that may be stored: as given, normalized,
/// without query string, and for a bare host also without the trailing `/`.
pub fn url_forms(url: &str) -> Vec<String> {
    let url = url.trim();
    let mut forms = vec![url.to_string()];
    if let Ok(mut parsed) = Url::parse(url) {
        parsed.set_fragment(None);
        let normalized = parsed.to_string();
        parsed.set_query(None);
        let stripped = parsed.to_string();
        let bare_host = parsed.path() == "/";

        for form in [normalized, stripped] {
            let slashless = bare_host.then(|| form.trim_end_matches('/').to_string());
            for candidate in std::iter::once(form).chain(slashless) {
                if !forms.contains(&candidate) {
                    forms.push(candidate);
                }
            }
        }
    }
    forms
}

/// Count of consecutive already-known links while paging one source.
#[derive(Debug, Clone)]
pub struct DuplicateStreak {
    limit: usize,
    current: usize,
}

impl DuplicateStreak {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            current: 0,
        }
    }

    /// Record a known link. Returns true once the streak reaches the limit.
    pub fn record_duplicate(&mut self) -> bool {
        self.current += 1;
        self.is_exhausted()
    }

    pub fn record_new(&mut self) {
        self.current = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.current >= self.limit
    }

    pub fn current(&self) -> usize {
        self.current
    }
}

impl Default for DuplicateStreak {
    fn default() -> Self {
        Self::new(DEFAULT_STREAK_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkItem;
    use crate::store::sqlite::tests::sample_posting;
    use crate::store::{SqliteStore, Store};
    use chrono::Utc;
    use std::sync::Arc;

    fn engine() -> (Arc<SqliteStore>, DedupEngine) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = DedupEngine::new(store.clone());
        (store, engine)
    }

    #[test]
    fn test_pre_scrape_matches_posting_urls() {
        let (store, engine) = engine();
        store
            .upsert_posting(&sample_posting("https://ex.com/job/1", "Engineer", "Acme"))
            .unwrap();

        assert!(engine.pre_scrape("https://ex.com/job/1").unwrap().is_some());
        // apply URL of the sample posting
        assert!(engine.pre_scrape("https://ex.com/job/1/apply").unwrap().is_some());
        // query-stripped form
        assert!(engine
            .pre_scrape("https://ex.com/job/1?utm_source=feed")
            .unwrap()
            .is_some());
        assert!(engine.pre_scrape("https://ex.com/job/2").unwrap().is_none());
    }

    #[test]
    fn test_pre_scrape_matches_pending_queue() {
        let (store, engine) = engine();
        store
            .insert_work_item(&WorkItem::new("https://ex.com/job/9", "manual", Utc::now()))
            .unwrap();

        let reason = engine.pre_scrape("https://ex.com/job/9#apply").unwrap();
        assert_eq!(reason.as_deref(), Some("already queued: https://ex.com/job/9"));
        assert!(engine.published_link("https://ex.com/job/9").unwrap().is_none());
    }

    #[test]
    fn test_post_scrape_title_and_company() {
        let (store, engine) = engine();
        store
            .upsert_posting(&sample_posting("https://ex.com/job/1", "SDE Intern", "Acme Inc"))
            .unwrap();

        assert!(engine.post_scrape("sde intern", Some("acme")).unwrap().is_some());
        assert!(engine.post_scrape("SDE INTERN", Some("ACME INC.")).unwrap().is_some());
        assert!(engine.post_scrape("SDE Intern", Some("Globex")).unwrap().is_none());
        assert!(engine.post_scrape("SDE Intern", None).unwrap().is_none());
        assert!(engine.post_scrape("Data Intern", Some("Acme")).unwrap().is_none());
    }

    #[test]
    fn test_post_finalize_ignores_inactive_and_self() {
        let (store, engine) = engine();
        let existing = sample_posting("https://ex.com/job/1", "Backend Engineer", "Acme");
        store.upsert_posting(&existing).unwrap();

        // Same record re-finalized
        assert!(engine.post_finalize(&existing).unwrap().is_none());

        let other = sample_posting("https://other.com/x", "backend engineer", "Acme");
        assert!(engine.post_finalize(&other).unwrap().is_some());

        store.set_posting_active(&existing.id, false).unwrap();
        assert!(engine.post_finalize(&other).unwrap().is_none());
    }

    #[test]
    fn test_companies_match() {
        assert!(companies_match("Acme", "acme inc"));
        assert!(companies_match("Acme Labs", "ACME"));
        assert!(!companies_match("Acme", "Globex"));
        assert!(!companies_match("", "Acme"));
    }

    #[test]
    fn test_url_forms() {
        assert_eq!(
            url_forms("https://ex.com/a?b=1#c"),
            vec!["https://ex.com/a?b=1#c", "https://ex.com/a?b=1", "https://ex.com/a"]
        );
        assert_eq!(url_forms("https://ex.com/a"), vec!["https://ex.com/a"]);
        assert_eq!(url_forms("not a url"), vec!["not a url"]);
        assert_eq!(
            url_forms("https://Careers.Acme.com"),
            vec![
                "https://Careers.Acme.com",
                "https://careers.acme.com/",
                "https://careers.acme.com"
            ]
        );
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("  https://ex.com/job/1?ref=x#apply "),
            Some("https://ex.com/job/1?ref=x".to_string())
        );
        assert_eq!(
            normalize_url("https://Careers.Acme.com"),
            Some("https://careers.acme.com/".to_string())
        );
        assert_eq!(normalize_url("javascript:void(0)"), None);
        assert_eq!(normalize_url("mailto:jobs@acme.com"), None);
    }

    #[test]
    fn test_duplicate_streak() {
        let mut streak = DuplicateStreak::default();
        for _ in 0..4 {
            assert!(!streak.record_duplicate());
        }
        streak.record_new();
        assert_eq!(streak.current(), 0);
        for _ in 0..4 {
            assert!(!streak.record_duplicate());
        }
        assert!(streak.record_duplicate());
        assert!(streak.is_exhausted());
    }
}
