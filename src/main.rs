use std::fs::OpenOptions;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trickle::app::AppContext;
use trickle::cli::{commands, Cli, Commands, DaemonAction, QueueAction};
use trickle::config::Config;
use trickle::daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; the daemon may log to a file instead of stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_file() {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(file).with_ansi(false))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    // Daemon stop/status only look at the PID file
    if let Commands::Daemon { action } = &cli.command {
        match action {
            DaemonAction::Stop => {
                daemon::stop_daemon()?;
                println!("Daemon stopped");
                return Ok(());
            }
            DaemonAction::Status => {
                println!("{}", daemon::daemon_status());
                return Ok(());
            }
            DaemonAction::Start { .. } => {}
        }
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if cli.config.is_some() {
        config.apply_env(|key| std::env::var(key).ok());
    }
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Scan { deep } => {
            commands::scan(&ctx, deep).await?;
        }
        Commands::Enqueue { urls, priority } => {
            commands::enqueue(&ctx, &urls, priority)?;
        }
        Commands::Import { urls } => {
            commands::import(&ctx, &urls).await?;
        }
        Commands::Publish { url, overrides } => {
            commands::publish(&ctx, &url, overrides.into()).await?;
        }
        Commands::Queue { action } => match action {
            QueueAction::List { status } => commands::list_queue(&ctx, status)?,
            QueueAction::Run { id } => commands::run_item(&ctx, id).await?,
            QueueAction::Retry { id } => commands::retry_item(&ctx, id)?,
            QueueAction::Delete { id } => commands::delete_item(&ctx, id)?,
            QueueAction::Stats => commands::queue_stats(&ctx)?,
        },
        Commands::Pause => {
            commands::set_paused(&ctx, true)?;
        }
        Commands::Resume => {
            commands::set_paused(&ctx, false)?;
        }
        Commands::Interval { minutes } => {
            commands::interval(&ctx, minutes)?;
        }
        Commands::Postings { limit } => {
            commands::list_postings(&ctx, limit)?;
        }
        Commands::Tick => {
            commands::tick(&ctx).await?;
        }
        Commands::Daemon { action } => {
            if let DaemonAction::Start {
                no_initial_scan, ..
            } = action
            {
                commands::start_daemon(&ctx, no_initial_scan).await?;
            }
        }
    }

    Ok(())
}
