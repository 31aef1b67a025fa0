//! vitalink-monitor - Wearable health device monitoring daemon.
//!
//! Run with: `cargo run -p vitalink-monitor -- --simulate`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use vitalink_core::mock::{MemoryMeasurementStore, MockTransport};
use vitalink_core::{HistoryStore, Monitor};
use vitalink_monitor::{Config, ConsoleSink};
use vitalink_types::AlertSeverity;

/// vitalink-monitor - Wearable health device monitoring daemon.
#[derive(Parser, Debug)]
#[command(name = "vitalink-monitor")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device address (overrides config).
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Base polling interval in seconds (overrides config).
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    /// Alert history file path (overrides config).
    #[arg(long, global = true)]
    history: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitor in the foreground (default behavior).
    Run {
        /// Use a simulated device instead of real hardware.
        #[arg(long)]
        simulate: bool,
    },

    /// Show the recorded alert history, newest first.
    Alerts {
        /// Only show alerts at or above this severity.
        #[arg(long)]
        severity: Option<String>,

        /// Delete all recorded alerts instead of listing them.
        #[arg(long)]
        clear: bool,
    },

    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Alerts { ref severity, clear }) => {
            show_alerts(&args, severity.as_deref(), clear)
        }
        Some(Command::Init { force }) => init_config(&args, force),
        Some(Command::Run { simulate }) => run_monitor(&args, simulate).await,
        None => run_monitor(&args, false).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(device) = &args.device {
        config.device.address = Some(device.clone());
    }
    if let Some(interval) = args.interval {
        config.monitor.base_interval = interval;
    }
    if let Some(history) = &args.history {
        config.history.path = history.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run_monitor(args: &Args, simulate: bool) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vitalink_core=info".parse()?)
                .add_directive("vitalink_monitor=info".parse()?),
        )
        .init();

    let config = load_config(args)?;
    let address = config.device.address.clone();

    let transport = if simulate {
        let address = address.as_deref().unwrap_or("SIM:00:00:00:00:01");
        info!(%address, "using simulated device transport");
        Arc::new(MockTransport::simulated(address))
    } else {
        // Hardware transports live out of tree and are injected by the
        // platform build; the stock daemon only ships the simulator.
        anyhow::bail!("no hardware transport available, run with --simulate");
    };

    info!("Opening alert history at {:?}", config.history.path);
    let history = Arc::new(HistoryStore::open_with_capacity(
        &config.history.path,
        config.history.capacity,
    )?);
    if config.history.prune_days > 0 {
        let removed = history.prune_older_than(config.history.prune_days);
        if removed > 0 {
            info!("pruned {removed} alerts older than {} days", config.history.prune_days);
        }
    }

    let monitor = Monitor::new(
        config.monitor_config(),
        transport,
        Arc::new(MemoryMeasurementStore::new()),
        Arc::new(config.threshold_table()),
        Arc::new(ConsoleSink::new()),
        history,
    );

    monitor.dispatcher().set_enabled(config.alerts.enabled);
    if !config.alerts.enabled {
        info!("alerting disabled by configuration");
    }

    monitor.start(address.as_deref()).await?;
    info!("monitoring, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    monitor.stop().await;

    // Give in-flight log lines a moment to flush.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

fn show_alerts(args: &Args, severity: Option<&str>, clear: bool) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let history = HistoryStore::open_with_capacity(&config.history.path, config.history.capacity)?;

    if clear {
        let count = history.len();
        history.clear();
        println!("Cleared {count} alerts");
        return Ok(());
    }

    let min_severity = severity.map(parse_severity).transpose()?;
    let alerts: Vec<_> = history
        .list()
        .into_iter()
        .filter(|a| min_severity.map_or(true, |min| a.severity >= min))
        .collect();

    if alerts.is_empty() {
        println!("No alerts recorded");
        return Ok(());
    }

    for alert in alerts {
        let when = alert
            .raised_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| alert.raised_at.to_string());
        let detail = match (alert.parameter, alert.value) {
            (Some(kind), Some(value)) => format!(
                "{} = {} {} (allowed {})",
                kind.label(),
                value,
                kind.unit(),
                alert.threshold_description()
            ),
            (None, Some(value)) => format!("level {value}"),
            _ => String::new(),
        };
        println!(
            "{when}  [{:<8}] {:<20} {detail}",
            alert.severity.to_string(),
            alert.category.to_string(),
        );
    }
    Ok(())
}

fn init_config(args: &Args, force: bool) -> anyhow::Result<()> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(vitalink_monitor::config::default_config_path);

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = Config::default();
    config.save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn parse_severity(s: &str) -> anyhow::Result<AlertSeverity> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Ok(AlertSeverity::Low),
        "medium" => Ok(AlertSeverity::Medium),
        "high" => Ok(AlertSeverity::High),
        "critical" => Ok(AlertSeverity::Critical),
        other => anyhow::bail!("unknown severity '{other}' (expected low/medium/high/critical)"),
    }
}
