use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tap_sparkthink::{load_config, Catalog, SingerWriter, Tap, TapConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tap-sparkthink",
    version,
    about = "Singer tap for the SparkThink GraphQL API"
)]
struct Cli {
    /// Path to a JSON (or .toml) config file; TAP_SPARKTHINK_* env vars otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the discovery catalog and exit
    #[arg(long)]
    discover: bool,

    /// Catalog selecting the streams to sync
    #[arg(long, visible_alias = "properties")]
    catalog: Option<PathBuf>,

    /// Accepted for Singer compatibility; every stream is a full-table sync
    #[arg(long)]
    state: Option<PathBuf>,

    /// Print tap metadata and exit
    #[arg(long)]
    about: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Logs go to stderr; stdout carries Singer messages only.
fn init_logging(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tap_sparkthink={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn about() -> serde_json::Value {
    json!({
        "name": "tap-sparkthink",
        "description": "Singer tap for the SparkThink GraphQL API",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": ["catalog", "discover", "about"],
        "settings": [
            {"name": "auth_endpoint", "required": true},
            {"name": "api_endpoint", "required": true},
            {"name": "service_account_id", "required": true},
            {"name": "client_secret", "required": true, "secret": true},
            {"name": "project_ids", "required": true},
            {"name": "response_batch_size", "default": 10},
            {"name": "user_agent"},
            {"name": "auth_timeout_secs", "default": 60},
            {"name": "request_timeout_secs", "default": 60},
            {"name": "max_pages", "default": 10000},
            {"name": "on_partition_error", "default": "abort"},
            {"name": "auth_retry"}
        ]
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut stdout = BufWriter::new(std::io::stdout());

    if cli.about {
        serde_json::to_writer_pretty(&mut stdout, &about())?;
        writeln!(stdout)?;
        stdout.flush()?;
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TapConfig::from_env().context("No --config given and environment config is incomplete")?,
    };
    info!(config = ?config, "Configuration loaded");

    let tap = Tap::from_config(config);

    if cli.discover {
        serde_json::to_writer_pretty(&mut stdout, &tap.discover())?;
        writeln!(stdout)?;
        stdout.flush()?;
        return Ok(());
    }

    if let Some(state) = &cli.state {
        info!(path = %state.display(), "Ignoring state file, all streams are full-table");
    }

    let catalog = cli
        .catalog
        .as_deref()
        .map(Catalog::load)
        .transpose()
        .context("Failed to load catalog")?;

    let mut writer = SingerWriter::new(stdout);
    let summary = tap
        .sync(catalog.as_ref(), &mut writer)
        .await
        .context("Sync failed")?;

    info!(
        streams = summary.streams.len(),
        records = summary.total_records(),
        "tap-sparkthink finished"
    );
    Ok(())
}
