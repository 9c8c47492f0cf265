//! Background daemon: one event loop driving the queue tick, the hourly
//! discovery scan and the daily deep scan.
//!
//! Each timer hands its work to a task, so a long scan never delays the
//! queue tick. The processor's own lock keeps ticks single-flight, and a
//! second lock does the same for scans.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::{Result, TrickleError};
use crate::config::Config;
use crate::discovery::{DiscoveryScanner, ScanDepth};
use crate::queue::{QueueProcessor, TickReport};

/// Daemon timer configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Queue tick interval in seconds (default: 60)
    pub tick_secs: u64,
    /// Quick discovery scan interval in seconds (default: 3600)
    pub scan_secs: u64,
    /// Deep discovery scan interval in seconds (default: 86400)
    pub deep_scan_secs: u64,
    /// Whether to run a quick scan immediately on start
    pub scan_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            scan_secs: 3600,
            deep_scan_secs: 86400,
            scan_on_start: true,
        }
    }
}

impl DaemonConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let parse = |field: &str, value: &str| {
            Self::parse_interval(value)
                .and_then(|secs| {
                    if secs == 0 {
                        Err(format!("{} must be greater than zero", field))
                    } else {
                        Ok(secs)
                    }
                })
                .map_err(TrickleError::Config)
        };

        Ok(Self {
            tick_secs: parse("queue.tick_interval", &config.queue.tick_interval)?,
            scan_secs: parse("discovery.scan_interval", &config.discovery.scan_interval)?,
            deep_scan_secs: parse(
                "discovery.deep_scan_interval",
                &config.discovery.deep_scan_interval,
            )?,
            scan_on_start: true,
        })
    }

    /// Parse interval string like "30s", "5m", "1h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '30s', '5m', '1h', '1d'", s))
        }
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon {
    processor: Arc<QueueProcessor>,
    scanner: Arc<DiscoveryScanner>,
    config: DaemonConfig,
    scanning: Arc<Mutex<()>>,
}

impl Daemon {
    pub fn new(
        processor: Arc<QueueProcessor>,
        scanner: Arc<DiscoveryScanner>,
        config: DaemonConfig,
    ) -> Self {
        Self {
            processor,
            scanner,
            config,
            scanning: Arc::new(Mutex::new(())),
        }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("trickle").join("daemon.pid"))
    }

    fn read_pid() -> Option<u32> {
        let pid_path = Self::pid_file_path()?;
        fs::read_to_string(pid_path).ok()?.trim().parse().ok()
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        Self::read_pid().is_some_and(Self::process_exists)
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Run until SIGINT or SIGTERM. Work already in flight is allowed to finish.
    pub async fn run(&self) -> Result<()> {
        if Self::is_running() {
            return Err(TrickleError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file()
            .map_err(|e| TrickleError::Other(format!("Failed to write PID file: {}", e)))?;

        tracing::info!(
            tick = %DaemonConfig::format_interval(self.config.tick_secs),
            scan = %DaemonConfig::format_interval(self.config.scan_secs),
            deep_scan = %DaemonConfig::format_interval(self.config.deep_scan_secs),
            sources = self.scanner.source_count(),
            pid = std::process::id(),
            "trickle daemon started"
        );

        let mut tasks = JoinSet::new();

        let mut tick_timer = interval(Duration::from_secs(self.config.tick_secs));
        let mut scan_timer = interval(Duration::from_secs(self.config.scan_secs));
        let mut deep_timer = interval(Duration::from_secs(self.config.deep_scan_secs));
        for timer in [&mut tick_timer, &mut scan_timer, &mut deep_timer] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }
        // The first tick of a tokio interval fires immediately
        if !self.config.scan_on_start {
            scan_timer.tick().await;
        }
        deep_timer.tick().await;

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            while tasks.try_join_next().is_some() {}

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tick_timer.tick() => {
                    let processor = self.processor.clone();
                    tasks.spawn(async move {
                        match processor.tick().await {
                            TickReport::Ran { item_id, outcome } => {
                                tracing::info!(item_id, done = outcome.is_done(), "Queue tick processed an item");
                            }
                            TickReport::Error(e) => tracing::error!("Queue tick error: {}", e),
                            other => tracing::debug!("Queue tick: {:?}", other),
                        }
                    });
                }
                _ = scan_timer.tick() => self.spawn_scan(&mut tasks, ScanDepth::Quick),
                _ = deep_timer.tick() => self.spawn_scan(&mut tasks, ScanDepth::Deep),
            }
        }

        tracing::info!(in_flight = tasks.len(), "Daemon shutting down");
        while tasks.join_next().await.is_some() {}
        self.remove_pid_file();

        Ok(())
    }

    fn spawn_scan(&self, tasks: &mut JoinSet<()>, depth: ScanDepth) {
        let Ok(guard) = self.scanning.clone().try_lock_owned() else {
            tracing::info!(%depth, "Previous discovery scan still running, skipping");
            return;
        };
        let scanner = self.scanner.clone();
        tasks.spawn(async move {
            let _guard = guard;
            scanner.scan(depth).await;
        });
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
        }
        _ => {
            tracing::warn!("Could not install signal handlers, falling back to Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(windows)]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> Result<()> {
    let pid_path = Daemon::pid_file_path()
        .ok_or_else(|| TrickleError::Other("Could not determine PID file path".to_string()))?;

    if !pid_path.exists() {
        return Err(TrickleError::Other(
            "No daemon is running (PID file not found)".to_string(),
        ));
    }

    let pid = Daemon::read_pid()
        .ok_or_else(|| TrickleError::Other("Invalid PID in PID file".to_string()))?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;

    if status.success() {
        let _ = fs::remove_file(&pid_path);
        Ok(())
    } else {
        Err(TrickleError::Other(format!(
            "Failed to stop daemon (PID {})",
            pid
        )))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match Daemon::read_pid() {
        Some(pid) if Daemon::process_exists(pid) => format!("Daemon is running (PID: {})", pid),
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}
