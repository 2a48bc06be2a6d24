//! CLI entry point for the presence scanner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use presence_discover::config::PresenceConfig;
use presence_discover::monitor::PresenceMonitor;
use presence_discover::tracker::PresenceTracker;

#[derive(Parser)]
#[command(name = "presence-discover")]
#[command(about = "Detect which known people are on the local network")]
struct Cli {
    /// Run a single presence check, print it as JSON, and exit.
    #[arg(long)]
    once: bool,

    /// With --once: include device details for present members.
    #[arg(long, requires = "once")]
    detailed: bool,

    /// With --once: ignore any cached scan.
    #[arg(long, requires = "once")]
    no_cache: bool,

    /// Keep scanning in the background and log arrivals and departures.
    #[arg(long)]
    daemon: bool,

    /// Roster file override (otherwise read from config).
    #[arg(long)]
    roster: Option<String>,

    /// Config file prefix (default: presence).
    #[arg(short, long, default_value = "presence")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = load_presence_config(&cli.config)?;
    config.resolve_roster_path(&config_dir(&cli.config)?);
    if let Some(roster) = &cli.roster {
        config.roster_path = roster.clone();
    }

    if cli.once {
        let monitor = PresenceMonitor::from_config(&config).await;
        let json = if cli.detailed {
            serde_json::to_string_pretty(&monitor.detailed_presence().await)?
        } else {
            let check = monitor.check(!cli.no_cache).await;
            serde_json::to_string_pretty(&check.result)?
        };
        println!("{json}");
    } else if cli.daemon {
        let monitor = Arc::new(PresenceMonitor::from_config(&config).await);
        let tracker = PresenceTracker::new(monitor, config.scan_interval());
        tracker.start().await;

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        tracker.stop().await;
    } else {
        anyhow::bail!("Specify --once (single check) or --daemon (background tracking)");
    }

    Ok(())
}

/// Directory holding the config file; relative roster paths live beside it.
fn config_dir(file_prefix: &str) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match Path::new(file_prefix).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => cwd.join(dir),
        _ => cwd,
    })
}

/// `[presence]` from `<prefix>.toml`, overridden by `PRESENCE__<FIELD>` variables.
fn load_presence_config(file_prefix: &str) -> anyhow::Result<PresenceConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("PRESENCE")
                .prefix_separator("__")
                .separator("__")
                .keep_prefix(true)
                .list_separator(",")
                .with_list_parse_key("presence.strategies")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<PresenceConfig>("presence") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(PresenceConfig::default()),
        Err(e) => Err(e.into()),
    }
}
