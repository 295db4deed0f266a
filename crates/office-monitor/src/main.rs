//! Office monitor daemon.
//!
//! Reads `topic payload` lines from stdin, the format `mosquitto_sub -v`
//! prints, and routes each message through the alert engine and device twin:
//!
//! ```text
//! mosquitto_sub -v -t 'sites/+/offices/+/#' | office-monitor --config monitor.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notify::{Notifier, NotifyChannel, SubscriberChannel};
use office_monitor::{
    AlertEngine, Clock, Disposition, EngineDeps, InMemoryStore, MessageRouter, MonitorConfig, SystemClock,
};

/// Office telemetry monitor - debounced alerting and device twin reconciliation
#[derive(Parser)]
#[command(name = "office-monitor")]
#[command(about = "Office telemetry monitor - debounced alerting and device twin reconciliation")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "OFFICE_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "OFFICE_MONITOR_LOG_FORMAT")]
    log_format: LogFormat,

    /// Print live events as JSON lines on stdout
    #[arg(long)]
    print_events: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

fn init_tracing(cli: &Cli) {
    let default_directives = if cli.verbose {
        "office_monitor=debug,notify=debug,info"
    } else {
        "office_monitor=info,notify=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    // Logs go to stderr; stdout stays free for piping.
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

/// Split a `mosquitto_sub -v` line at the first whitespace.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((topic, payload)) => Some((topic, payload.trim_start())),
        None => Some((line, "")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = match &cli.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    let seed = config.seed_data().context("Invalid seed data")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryStore::new(Arc::clone(&clock)));
    store.seed(seed).await.context("Failed to seed store")?;

    let live = Arc::new(SubscriberChannel::default());
    if cli.print_events {
        let mut feed = live.subscribe();
        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => println!("{event}"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Live event printer lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
    let notifier = Arc::new(Notifier::from_env(vec![live as Arc<dyn NotifyChannel>]));

    let engine = Arc::new(AlertEngine::new(
        EngineDeps {
            alerts: store.clone(),
            twin: store.clone(),
            site: store.clone(),
            sink: notifier.clone(),
            clock: Arc::clone(&clock),
        },
        &config.debounce,
    ));
    let router = MessageRouter::new(Arc::clone(&engine), store.clone(), notifier);

    info!(
        spaces = config.spaces.len(),
        devices = config.devices.len(),
        idle_ttl_secs = config.tracking.idle_ttl_secs,
        "Office monitor started, reading messages from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sweep = tokio::time::interval(config.tracking.sweep_interval());
    // First tick completes immediately.
    sweep.tick().await;

    let mut processed: u64 = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!(processed, "Input closed, shutting down");
                    break;
                };
                let Some((topic, payload)) = split_line(&line) else {
                    continue;
                };
                processed += 1;
                match router.handle(topic, payload.as_bytes()).await {
                    Disposition::Dropped | Disposition::Rejected(_) => {}
                    disposition => debug!(topic, ?disposition, "Message handled"),
                }
            }
            _ = sweep.tick() => {
                let evicted = engine
                    .registry()
                    .sweep_idle(clock.now(), config.tracking.idle_ttl())
                    .await;
                if evicted > 0 {
                    info!(evicted, "Evicted idle tracking state");
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!(processed, "Interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}
