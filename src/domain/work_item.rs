use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Pending,
    Processed,
    Failed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Processed => "processed",
            WorkStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(WorkStatus::Pending),
            "processed" => Ok(WorkStatus::Processed),
            "failed" => Ok(WorkStatus::Failed),
            other => Err(format!("Unknown work status: {}", other)),
        }
    }
}

/// A link waiting in the drip-feed queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub source_url: String,
    pub status: WorkStatus,
    pub scheduled_for: DateTime<Utc>,
    pub priority: u8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub source: String,
    pub last_error: Option<String>,
    pub posting_id: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(source_url: impl Into<String>, source: impl Into<String>, scheduled_for: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            source_url: source_url.into(),
            status: WorkStatus::Pending,
            scheduled_for,
            priority: 0,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            source: source.into(),
            last_error: None,
            posting_id: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn can_retry(&self) -> bool {
        self.status == WorkStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == WorkStatus::Pending && self.scheduled_for <= now
    }
}
