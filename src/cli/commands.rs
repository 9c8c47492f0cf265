use crate::app::{AppContext, Result, TrickleError};
use crate::daemon::{Daemon, DaemonConfig};
use crate::discovery::ScanDepth;
use crate::domain::settings::{INTERVAL_MINUTES_KEY, QUEUE_PAUSED_KEY};
use crate::domain::{JobPosting, Outcome, Overrides, WorkItem, WorkStatus};
use crate::queue::TickReport;
use crate::store::Store;

pub async fn scan(ctx: &AppContext, deep: bool) -> Result<()> {
    let scanner = ctx.scanner()?;
    if scanner.source_count() == 0 {
        println!("No discovery sources configured");
        return Ok(());
    }

    let depth = if deep { ScanDepth::Deep } else { ScanDepth::Quick };
    let report = scanner.scan(depth).await;

    for source in &report.sources {
        print!(
            "  {}: {} links on {} pages, {} queued, {} known",
            source.name, source.discovered, source.pages, source.queued, source.duplicates
        );
        if source.stopped_by_streak {
            print!(" (stopped on known links)");
        }
        println!();
        if let Some(error) = &source.error {
            eprintln!("    Error: {}", error);
        }
    }
    println!(
        "Scan complete: {} queued, {} known, {} errors",
        report.queued(),
        report.duplicates(),
        report.errors()
    );
    Ok(())
}

pub fn enqueue(ctx: &AppContext, urls: &[String], priority: Option<u8>) -> Result<()> {
    let priority = priority.unwrap_or(ctx.config.queue.manual_priority);
    let report = ctx.queue.enqueue_many(urls, "manual", priority)?;

    for item in &report.queued {
        println!(
            "Queued #{} for {}: {}",
            item.id,
            item.scheduled_for.format("%Y-%m-%d %H:%M"),
            item.source_url
        );
    }
    for (url, reason) in &report.rejected {
        println!("Not queued {}: {}", url, reason);
    }
    Ok(())
}

pub async fn import(ctx: &AppContext, urls: &[String]) -> Result<()> {
    let pipeline = ctx.pipeline()?;
    println!("Importing {} links...", urls.len());

    let report = pipeline.process_batch(urls).await;

    for posting in &report.published {
        print_posting(posting);
    }
    for (url, reason) in &report.skipped {
        println!("  Skipped {}: {}", url, reason);
    }
    for (url, reason) in &report.failed {
        eprintln!("  Failed {}: {}", url, reason);
    }
    if report.halted() {
        eprintln!(
            "AI service rate limited; {} links not attempted:",
            report.not_attempted.len()
        );
        for url in &report.not_attempted {
            eprintln!("  {}", url);
        }
    }

    println!(
        "Import complete: {} published, {} skipped, {} failed",
        report.published.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}

pub async fn publish(ctx: &AppContext, url: &str, overrides: Overrides) -> Result<()> {
    let pipeline = ctx.pipeline()?;

    match pipeline.process(url, &overrides).await {
        Outcome::Done(posting) => {
            println!("Published:");
            print_posting(&posting);
            Ok(())
        }
        other => Err(TrickleError::Other(other.reason().unwrap_or_default())),
    }
}

pub fn list_queue(ctx: &AppContext, status: Option<WorkStatus>) -> Result<()> {
    let items = ctx.queue.list(status)?;

    if items.is_empty() {
        println!("No work items");
        return Ok(());
    }

    for item in items {
        print_item(&item);
    }
    Ok(())
}

pub async fn run_item(ctx: &AppContext, id: i64) -> Result<()> {
    let processor = ctx.processor()?;
    report_tick(processor.run_now(id).await?);
    Ok(())
}

pub fn retry_item(ctx: &AppContext, id: i64) -> Result<()> {
    let item = ctx.queue.retry(id)?;
    println!(
        "Retry {}/{} of #{} scheduled for {}",
        item.retry_count,
        item.max_retries,
        item.id,
        item.scheduled_for.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

pub fn delete_item(ctx: &AppContext, id: i64) -> Result<()> {
    ctx.queue.delete(id)?;
    println!("Deleted #{}", id);
    Ok(())
}

pub fn queue_stats(ctx: &AppContext) -> Result<()> {
    let stats = ctx.queue.stats()?;
    let settings = ctx.store.load_settings()?;

    println!("Pending:   {}", stats.pending);
    println!("Processed: {}", stats.processed);
    println!("Failed:    {}", stats.failed);
    println!(
        "Interval:  {} minutes{}",
        settings.interval_minutes,
        if settings.queue_paused { " (paused)" } else { "" }
    );
    Ok(())
}

pub fn set_paused(ctx: &AppContext, paused: bool) -> Result<()> {
    ctx.store
        .set_setting(QUEUE_PAUSED_KEY, if paused { "true" } else { "false" })?;
    println!("Queue {}", if paused { "paused" } else { "resumed" });
    Ok(())
}

pub fn interval(ctx: &AppContext, minutes: Option<u32>) -> Result<()> {
    match minutes {
        Some(0) => Err(TrickleError::Other(
            "Interval must be at least one minute".to_string(),
        )),
        Some(minutes) => {
            ctx.store
                .set_setting(INTERVAL_MINUTES_KEY, &minutes.to_string())?;
            println!("Postings will be spaced {} minutes apart", minutes);
            Ok(())
        }
        None => {
            let settings = ctx.store.load_settings()?;
            println!("{} minutes", settings.interval_minutes);
            Ok(())
        }
    }
}

pub fn list_postings(ctx: &AppContext, limit: usize) -> Result<()> {
    let postings = ctx.store.list_postings(limit)?;

    if postings.is_empty() {
        println!("No postings");
        return Ok(());
    }

    for posting in postings {
        let marker = if posting.is_active { " " } else { "x" };
        println!(
            "{} {} {} | {} | {}",
            marker,
            posting.created_at.format("%Y-%m-%d"),
            posting.short_id(),
            posting.title,
            posting.company
        );
    }
    Ok(())
}

pub async fn tick(ctx: &AppContext) -> Result<()> {
    let processor = ctx.processor()?;
    report_tick(processor.tick().await);
    Ok(())
}

pub async fn start_daemon(ctx: &AppContext, no_initial_scan: bool) -> Result<()> {
    let mut config = DaemonConfig::from_config(&ctx.config)?;
    config.scan_on_start = !no_initial_scan;

    let daemon = Daemon::new(ctx.processor()?, ctx.scanner()?, config);
    daemon.run().await
}

fn report_tick(report: TickReport) {
    match report {
        TickReport::Paused => println!("Queue is paused"),
        TickReport::Busy => println!("Another run is in progress"),
        TickReport::Idle => println!("Nothing due"),
        TickReport::Lost(id) => println!("#{} was claimed by another processor", id),
        TickReport::Ran { item_id, outcome } => match outcome {
            Outcome::Done(posting) => {
                println!("#{} published:", item_id);
                print_posting(&posting);
            }
            other => println!("#{} failed: {}", item_id, other.reason().unwrap_or_default()),
        },
        TickReport::Error(e) => eprintln!("Tick failed: {}", e),
    }
}

fn print_item(item: &WorkItem) {
    println!(
        "#{:<5} {:<9} {} p{} {}",
        item.id,
        item.status,
        item.scheduled_for.format("%Y-%m-%d %H:%M"),
        item.priority,
        item.source_url
    );
    if let Some(error) = &item.last_error {
        println!("        {} (retries {}/{})", error, item.retry_count, item.max_retries);
    }
}

fn print_posting(posting: &JobPosting) {
    println!("  {} at {} ({})", posting.title, posting.company, posting.location);
    println!("    {} | {}", posting.job_type, posting.apply_url);
}
