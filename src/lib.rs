//! # trickle
//!
//! Discovers job postings across static pages, vendor APIs and client-rendered
//! sites, turns each into a structured record with a two-stage AI pipeline,
//! filters duplicates and publishes on a drip-feed schedule.
//!
//! ## Architecture
//!
//! ```text
//! Discovery → Queue → Source Adapter (+ headless fallback) → Dedup
//!   → Extraction AI → Refinement AI → Finalize → Dedup → Store → Notify
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Queue a link; it is published after the configured interval
//! trickle enqueue https://boards.greenhouse.io/acme/jobs/123
//!
//! # Publish links immediately
//! trickle import https://jobs.lever.co/acme/0b1c...
//!
//! # Run the queue tick and discovery timers
//! trickle daemon start
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, fetcher, queue, and on demand the pipeline, processor and scanner.
pub mod app;

/// Configuration loaded from `~/.config/trickle/config.toml`, with
/// environment overrides for secrets.
pub mod config;

/// Background daemon.
///
/// - `trickle daemon start` - Run the queue and discovery timers
/// - `trickle daemon stop` - Stop the daemon
/// - `trickle daemon status` - Check if daemon is running
pub mod daemon;

/// Command-line interface using clap.
pub mod cli;

/// Duplicate detection before scraping, after scraping and after finalizing.
pub mod dedup;

/// Discovery sources (HTML listings, feeds) and the discovery scan.
pub mod discovery;

/// Core domain models.
///
/// - [`WorkItem`](domain::WorkItem): A queued link and its retry bookkeeping
/// - [`JobPosting`](domain::JobPosting): A published posting with a SHA-256 ID
/// - [`Outcome`](domain::Outcome): The result every pipeline stage returns
pub mod domain;

/// Plain HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for page fetching
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Extraction and refinement over an OpenAI-compatible endpoint.
pub mod ai;

/// Notification fan-out to Telegram and webhooks.
pub mod notify;

/// The per-item pipeline and the merge policy for the final record.
pub mod pipeline;

/// The drip-feed queue and its processor.
pub mod queue;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Source adapters: vendor APIs, static HTML extraction and the headless
/// Chrome fallback.
///
/// - [`PageScraper`](scraper::PageScraper): The general-purpose adapter
/// - [`ChromeRenderer`](scraper::ChromeRenderer): Headless render fallback
/// - [`ScraperConfig`](scraper::ScraperConfig): Configuration options
pub mod scraper;
