use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::app::{Result, TrickleError};
use crate::domain::{JobPosting, Outcome, Overrides, WorkItem, WorkStatus};
use crate::pipeline::Pipeline;
use crate::store::SharedStore;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    Paused,
    /// Another tick or manual run holds the lock
    Busy,
    Idle,
    /// Another processor claimed the item first
    Lost(i64),
    Ran { item_id: i64, outcome: Outcome<JobPosting> },
    Error(String),
}

/// Runs at most one due item per tick through the pipeline.
pub struct QueueProcessor {
    store: SharedStore,
    pipeline: Arc<Pipeline>,
    running: Mutex<()>,
}

impl QueueProcessor {
    pub fn new(store: SharedStore, pipeline: Arc<Pipeline>) -> Self {
        Self {
            store,
            pipeline,
            running: Mutex::new(()),
        }
    }

    /// One timer tick. Never panics and never returns an error: anything that
    /// goes wrong is logged and reported.
    pub async fn tick(&self) -> TickReport {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!("Queue tick skipped, previous run still in progress");
            return TickReport::Busy;
        };

        match self.tick_locked().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Queue tick failed: {}", e);
                TickReport::Error(e.to_string())
            }
        }
    }

    async fn tick_locked(&self) -> Result<TickReport> {
        let settings = self.store.load_settings()?;
        if settings.queue_paused {
            tracing::debug!("Queue paused");
            return Ok(TickReport::Paused);
        }

        let Some(item) = self.store.next_due_item(Utc::now())? else {
            return Ok(TickReport::Idle);
        };

        self.run_item(item).await
    }

    /// Process a pending item immediately, whatever its scheduled time. Waits
    /// for a running tick to finish first.
    pub async fn run_now(&self, id: i64) -> Result<TickReport> {
        let _guard = self.running.lock().await;

        let item = self
            .store
            .get_work_item(id)?
            .ok_or_else(|| TrickleError::NotFound(format!("work item {}", id)))?;
        if item.status != WorkStatus::Pending {
            return Err(TrickleError::Other(format!(
                "work item {} is {}, only pending items can be run",
                id, item.status
            )));
        }

        self.run_item(item).await
    }

    async fn run_item(&self, item: WorkItem) -> Result<TickReport> {
        if !self.store.claim_work_item(item.id, Utc::now())? {
            tracing::info!(item_id = item.id, "Work item already claimed");
            return Ok(TickReport::Lost(item.id));
        }

        tracing::info!(item_id = item.id, url = %item.source_url, "Processing work item");
        let outcome = self
            .pipeline
            .process(&item.source_url, &Overrides::default())
            .await;

        let recorded = match &outcome {
            Outcome::Done(posting) => self.store.mark_processed(item.id, &posting.id),
            other => self
                .store
                .mark_failed(item.id, &other.reason().unwrap_or_default()),
        };
        if let Err(e) = recorded {
            // Leave the item for the next tick rather than stuck behind our claim
            if let Err(release) = self.store.release_claim(item.id) {
                tracing::warn!(item_id = item.id, "Could not release claim: {}", release);
            }
            return Err(e);
        }

        Ok(TickReport::Ran {
            item_id: item.id,
            outcome,
        })
    }
}
