pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{Overrides, WorkStatus};

#[derive(Parser)]
#[command(name = "trickle")]
#[command(about = "Discover job postings, structure them with AI and publish them on a drip-feed schedule", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/trickle/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one discovery scan over the configured sources
    Scan {
        /// Walk the deep-scan page limit instead of the quick one
        #[arg(long)]
        deep: bool,
    },
    /// Queue links for scheduled publishing
    Enqueue {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Priority 0-10; breaks ties between items due at the same time
        #[arg(short, long)]
        priority: Option<u8>,
    },
    /// Publish links right away, stopping if the AI service rate limits
    Import {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Publish one link now, with hand-written fields taking precedence
    Publish {
        url: String,

        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Inspect and manage the queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Pause the queue processor
    Pause,
    /// Resume the queue processor
    Resume,
    /// Show or set the spacing between published postings
    Interval {
        /// Minutes between postings
        minutes: Option<u32>,
    },
    /// List recently published postings
    Postings {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Run a single processor tick
    Tick,
    /// Background daemon driving the queue and discovery timers
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// List work items
    List {
        /// Only items with this status (pending, processed, failed)
        #[arg(short, long)]
        status: Option<WorkStatus>,
    },
    /// Process a pending item now, ignoring its scheduled time
    Run { id: i64 },
    /// Move a failed item back into the queue
    Retry { id: i64 },
    /// Delete an item
    Delete { id: i64 },
    /// Item counts by status
    Stats,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon in this process
    Start {
        /// Log file path (default: stderr)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Skip the discovery scan on start
        #[arg(long)]
        no_initial_scan: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[derive(clap::Args, Debug, Default)]
pub struct OverrideArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub salary: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub eligibility: Option<String>,
    #[arg(long)]
    pub apply_url: Option<String>,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Overrides {
            title: args.title,
            company: args.company,
            location: args.location,
            salary: args.salary,
            description: args.description,
            eligibility: args.eligibility,
            apply_url: args.apply_url,
        }
    }
}

impl Cli {
    /// The log file, when the daemon was asked to write one.
    pub fn log_file(&self) -> Option<&PathBuf> {
        match &self.command {
            Commands::Daemon {
                action: DaemonAction::Start { log, .. },
            } => log.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_queue_list_status() {
        let cli = Cli::parse_from(["trickle", "queue", "list", "--status", "failed"]);
        match cli.command {
            Commands::Queue {
                action: QueueAction::List { status },
            } => assert_eq!(status, Some(WorkStatus::Failed)),
            _ => panic!("expected queue list"),
        }
    }

    #[test]
    fn test_parse_publish_overrides() {
        let cli = Cli::parse_from([
            "trickle",
            "publish",
            "https://ex.com/job/1",
            "--title",
            "SDE Intern",
            "--apply-url",
            "https://acme.com/apply",
        ]);
        let Commands::Publish { url, overrides } = cli.command else {
            panic!("expected publish");
        };
        let overrides = Overrides::from(overrides);
        assert_eq!(url, "https://ex.com/job/1");
        assert_eq!(overrides.title.as_deref(), Some("SDE Intern"));
        assert_eq!(overrides.apply_url.as_deref(), Some("https://acme.com/apply"));
        assert!(overrides.company.is_none());
    }

    #[test]
    fn test_log_file_only_for_daemon_start() {
        let cli = Cli::parse_from(["trickle", "daemon", "start", "--log", "/tmp/t.log"]);
        assert_eq!(cli.log_file(), Some(&PathBuf::from("/tmp/t.log")));

        let cli = Cli::parse_from(["trickle", "tick"]);
        assert!(cli.log_file().is_none());
    }

    #[test]
    fn test_enqueue_requires_url() {
        assert!(Cli::try_parse_from(["trickle", "enqueue"]).is_err());
    }
}
