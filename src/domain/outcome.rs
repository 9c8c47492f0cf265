use thiserror::Error;

use crate::app::TrickleError;

/// Result of a single pipeline stage.
///
/// Stages never raise errors for expected conditions: a skipped link (expired
/// listing, missing apply link) and a failed one (network, extraction,
/// duplicate) are both ordinary values the caller inspects.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Skipped(String),
    Failed(Failure),
}

impl<T> Outcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
            Outcome::Failed(failure) => Outcome::Failed(failure),
        }
    }

    /// Human-readable reason for anything other than `Done`.
    pub fn reason(&self) -> Option<String> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Skipped(reason) => Some(format!("skipped: {}", reason)),
            Outcome::Failed(failure) => Some(failure.to_string()),
        }
    }
}

impl<T> From<Failure> for Outcome<T> {
    fn from(failure: Failure) -> Self {
        Outcome::Failed(failure)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    #[error("network failure: {0}")]
    Network(String),

    #[error("blocked or missing (HTTP {0})")]
    Blocked(u16),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("AI service rate limited")]
    RateLimited,

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("{0}")]
    Other(String),
}

impl Failure {
    /// Failures that are worth one more attempt through the headless renderer.
    pub fn escalates(&self) -> bool {
        matches!(self, Failure::Network(_) | Failure::Blocked(_))
    }

    /// HTTP statuses that usually mean bot-blocking rather than a real error.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 | 404 => Failure::Blocked(status),
            other => Failure::Other(format!("HTTP {}", other)),
        }
    }
}

impl From<TrickleError> for Failure {
    fn from(err: TrickleError) -> Self {
        match err {
            TrickleError::Http(e) => Failure::Network(e.to_string()),
            other => Failure::Other(other.to_string()),
        }
    }
}
