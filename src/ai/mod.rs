//! Extraction and refinement over a chat-completions endpoint.
//!
//! The pipeline only sees the [`JobAi`] trait. Replies are parsed leniently
//! (code fences stripped, numbers accepted as strings) and every failure
//! mode collapses into a [`Completion`] rather than an error.

mod client;
mod config;
pub mod prompts;
pub mod util;

pub use client::OpenAiClient;
pub use config::AiConfig;

use async_trait::async_trait;

use crate::domain::{ExtractedJob, RefinedJob};

/// Result of one AI call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Parsed(T),
    /// The call failed or the reply did not parse
    Unparsed,
    /// The upstream service is rate limiting us; stop the current batch
    RateLimited,
}

impl<T> Completion<T> {
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> Completion<U> {
        match self {
            Completion::Parsed(value) => match f(value) {
                Some(parsed) => Completion::Parsed(parsed),
                None => Completion::Unparsed,
            },
            Completion::Unparsed => Completion::Unparsed,
            Completion::RateLimited => Completion::RateLimited,
        }
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            Completion::Parsed(value) => Some(value),
            _ => None,
        }
    }
}

#[async_trait]
pub trait JobAi: Send + Sync {
    /// Turn an enriched scrape blob into a draft structured record.
    async fn extract(&self, blob: &str) -> Completion<ExtractedJob>;

    /// Re-derive polished description and eligibility from a draft.
    async fn refine(&self, draft: &ExtractedJob) -> Completion<RefinedJob>;
}
