use anyhow::Context;
use clap::Parser;
use snmp_monitor::config::MonitorConfig;
use snmp_monitor::persistence::{MemoryStore, Persistence, SqliteStore};
use snmp_monitor::snmp::{SnmpClient, SnmpTransport};
use snmp_monitor::DeviceMonitor;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

fn init_logger() {
    // Use LOG_LEVEL env var (fall back to RUST_LOG for backwards compatibility)
    let filter = env::var("LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&filter))
        .with_target(false)
        .init();
}

#[derive(Parser)]
#[command(name = "snmp-monitor")]
#[command(about = "SNMP device polling and correlation engine", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, env = "SNMP_MONITOR_CONFIG")]
    config: PathBuf,

    /// SQLite database path (overrides database_path from the config)
    #[arg(long, env = "SNMP_MONITOR_DATABASE")]
    database: Option<PathBuf>,

    /// Keep results in memory instead of writing them to SQLite
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn open_store(args: &Args, config: &MonitorConfig) -> anyhow::Result<Arc<dyn Persistence>> {
    if args.dry_run {
        tracing::info!("Dry run, poll results are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = args.database.as_ref().unwrap_or(&config.database_path);
    let store = SqliteStore::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    tracing::info!("Writing poll results to {}", path.display());
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    tracing::info!("SNMP monitor starting");

    let config = MonitorConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let store = open_store(&args, &config)?;
    let transport: Arc<dyn SnmpTransport> = Arc::new(SnmpClient::new(config.client_options()));

    let monitor = Arc::new(
        DeviceMonitor::new(transport, store).with_default_interval(config.poll_interval()),
    );

    let mut starts = JoinSet::new();
    for device in &config.devices {
        let credentials = device.to_credentials()?;
        let interval = device.poll_interval();
        let monitor = Arc::clone(&monitor);
        starts.spawn(async move {
            let device_id = credentials.device_id.clone();
            let ok = monitor.start_monitoring(credentials, interval).await;
            (device_id, ok)
        });
    }
    tracing::info!("Starting {} devices", config.devices.len());

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to wait for shutdown signal")?;
                tracing::info!("Shutdown signal received, stopping all schedules...");
                break;
            }
            Some(joined) = starts.join_next() => match joined {
                Ok((device_id, true)) => tracing::info!("Initial poll of {} succeeded", device_id),
                Ok((device_id, false)) => {
                    tracing::warn!("Initial poll of {} failed, will retry on schedule", device_id)
                }
                Err(e) => tracing::error!("Device start task failed: {}", e),
            },
        }
    }

    starts.abort_all();
    monitor.shutdown();

    tracing::info!("SNMP monitor stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT shutdown signal.
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On non-Unix platforms, just wait for Ctrl+C
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "snmp-monitor",
            "--config",
            "/etc/snmp-monitor.json",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/snmp-monitor.json"));
        assert!(args.dry_run);
        assert!(args.database.is_none());
    }

    #[test]
    fn test_dry_run_uses_memory_store() {
        let args = Args::try_parse_from(["snmp-monitor", "--config", "x.json", "--dry-run"])
            .unwrap();
        assert!(open_store(&args, &MonitorConfig::default()).is_ok());
    }

    #[test]
    fn test_database_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.db");
        let args = Args::try_parse_from([
            "snmp-monitor",
            "--config",
            "x.json",
            "--database",
            path.to_str().unwrap(),
        ])
        .unwrap();

        open_store(&args, &MonitorConfig::default()).unwrap();
        assert!(path.exists());
    }
}
