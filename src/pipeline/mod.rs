//! The per-item pipeline:
//!
//! ```text
//! dedup (link) → source adapter → dedup (title/company) → extraction AI
//!   → refinement AI → finalize → dedup (final record) → persist → notify
//! ```
//!
//! Every step reports through [`Outcome`], so a single item can never take
//! down the tick or scan that is driving it.

pub mod finalize;

use std::sync::Arc;

use chrono::Utc;

use crate::ai::prompts::extraction_blob;
use crate::ai::{Completion, JobAi};
use crate::dedup::DedupEngine;
use crate::domain::{Failure, JobPosting, Outcome, Overrides};
use crate::notify::FanOut;
use crate::scraper::SourceAdapter;
use crate::store::SharedStore;

use finalize::{finalize, Draft};

pub struct Pipeline {
    adapter: Arc<dyn SourceAdapter>,
    ai: Arc<dyn JobAi>,
    store: SharedStore,
    dedup: DedupEngine,
    notifier: Arc<FanOut>,
}

/// What happened to each link of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub published: Vec<JobPosting>,
    pub skipped: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
    /// Links never attempted because the AI service started rate limiting
    pub not_attempted: Vec<String>,
}

impl BatchReport {
    pub fn halted(&self) -> bool {
        !self.not_attempted.is_empty()
    }
}

impl Pipeline {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        ai: Arc<dyn JobAi>,
        store: SharedStore,
        notifier: Arc<FanOut>,
    ) -> Self {
        let dedup = DedupEngine::new(store.clone());
        Self {
            adapter,
            ai,
            store,
            dedup,
            notifier,
        }
    }

    pub fn dedup(&self) -> &DedupEngine {
        &self.dedup
    }

    /// Run one link end to end.
    pub async fn process(&self, url: &str, overrides: &Overrides) -> Outcome<JobPosting> {
        let outcome = self.run(url, overrides).await;
        match &outcome {
            Outcome::Done(posting) => {
                tracing::info!(url = %url, id = posting.short_id(), title = %posting.title, "Published");
            }
            Outcome::Skipped(reason) => tracing::info!(url = %url, "Skipped: {}", reason),
            Outcome::Failed(failure) => tracing::warn!(url = %url, "Failed: {}", failure),
        }
        outcome
    }

    async fn run(&self, url: &str, overrides: &Overrides) -> Outcome<JobPosting> {
        match self.dedup.published_link(url) {
            Ok(Some(reason)) => return Failure::Duplicate(reason).into(),
            Ok(None) => {}
            Err(e) => return Failure::from(e).into(),
        }

        let scraped = match self.adapter.scrape(url).await {
            Outcome::Done(scraped) => scraped,
            Outcome::Skipped(reason) => return Outcome::Skipped(reason),
            Outcome::Failed(failure) => return failure.into(),
        };

        let title = overrides.title.as_deref().unwrap_or(&scraped.title);
        let company = overrides.company.as_deref().or(scraped.company.as_deref());
        match self.dedup.post_scrape(title, company) {
            Ok(Some(reason)) => return Failure::Duplicate(reason).into(),
            Ok(None) => {}
            Err(e) => return Failure::from(e).into(),
        }

        let extracted = match self.ai.extract(&extraction_blob(url, &scraped)).await {
            Completion::Parsed(extracted) => extracted,
            Completion::RateLimited => return Failure::RateLimited.into(),
            Completion::Unparsed => {
                return Failure::Extraction("AI returned no usable record".to_string()).into()
            }
        };
        if extracted.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Failure::Extraction("AI returned no usable title".to_string()).into();
        }

        let refined = match self.ai.refine(&extracted).await {
            Completion::Parsed(refined) => Some(refined),
            Completion::RateLimited => return Failure::RateLimited.into(),
            Completion::Unparsed => {
                tracing::debug!(url = %url, "Refinement unusable, keeping extracted text");
                None
            }
        };

        let posting = match finalize(
            Draft {
                source_url: url,
                scraped: &scraped,
                extracted: &extracted,
                refined: refined.as_ref(),
                overrides,
            },
            Utc::now(),
        ) {
            Ok(posting) => posting,
            Err(failure) => return failure.into(),
        };

        match self.dedup.post_finalize(&posting) {
            Ok(Some(reason)) => return Failure::Duplicate(reason).into(),
            Ok(None) => {}
            Err(e) => return Failure::from(e).into(),
        }

        if let Err(e) = self.store.upsert_posting(&posting) {
            return Failure::from(e).into();
        }

        self.notifier.announce(&posting).await;

        Outcome::Done(posting)
    }

    /// Process links in order, stopping at the first rate limit. Links
    /// already published stay published.
    pub async fn process_batch(&self, urls: &[String]) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, url) in urls.iter().enumerate() {
            match self.process(url, &Overrides::default()).await {
                Outcome::Done(posting) => report.published.push(posting),
                Outcome::Skipped(reason) => report.skipped.push((url.clone(), reason)),
                Outcome::Failed(Failure::RateLimited) => {
                    tracing::warn!(
                        remaining = urls.len() - i,
                        "AI service rate limited, halting batch"
                    );
                    report.not_attempted = urls[i..].to_vec();
                    break;
                }
                Outcome::Failed(failure) => report.failed.push((url.clone(), failure.to_string())),
            }
        }

        report
    }
}
