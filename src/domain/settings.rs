use serde::{Deserialize, Serialize};

pub const QUEUE_PAUSED_KEY: &str = "posting_queue_paused";
pub const INTERVAL_MINUTES_KEY: &str = "schedule_interval_minutes";

pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;

/// Process-wide runtime switches, read fresh at the top of every processor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub queue_paused: bool,
    pub interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue_paused: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

impl Settings {
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.interval_minutes.max(1)))
    }

    pub fn parse_bool(raw: &str) -> bool {
        matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    }
}
