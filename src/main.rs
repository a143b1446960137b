//! Swellcast - Hawaii surf forecast engine.
//!
//! Thin driver around the library pipeline: loads a crawler-delivered
//! bundle, runs fusion and the specialist team, and prints the synthesized
//! forecast.
//!
//! # Usage
//!
//! ```bash
//! # Run against a downloaded bundle (expects data/<bundle-id>/sources.json)
//! swellcast --bundle-id 20251007_0600
//!
//! # With an explicit config file and horizon
//! swellcast --bundle-id 20251007_0600 --days-ahead 3 --config swellcast.toml
//! ```
//!
//! # Environment Variables
//!
//! - `SWELLCAST_CONFIG`: Path to the TOML config (overridden by `--config`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use swellcast::config::ForecastConfig;
use swellcast::engine::{ForecastEngine, ForecastRequest};
use swellcast::llm::TemplateClient;

#[derive(Parser, Debug)]
#[command(name = "swellcast")]
#[command(about = "Hawaii surf forecast engine - data fusion and specialist synthesis")]
#[command(version)]
struct CliArgs {
    /// Bundle identifier under the data directory
    /// (reads data/<bundle-id>/sources.json and the bundle's image folders)
    #[arg(long)]
    bundle_id: String,

    /// Forecast horizon in days
    #[arg(long)]
    days_ahead: Option<i64>,

    /// Validation lookback window in days
    #[arg(long)]
    lookback_days: Option<i64>,

    /// Path to a TOML config file (overrides SWELLCAST_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => ForecastConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ForecastConfig::load(),
    };
    if let Some(days) = args.days_ahead {
        config.forecast.horizon_days = days;
    }
    if let Some(days) = args.lookback_days {
        config.forecast.lookback_days = days;
    }

    let sources_path = config
        .paths
        .data_dir
        .join(&args.bundle_id)
        .join("sources.json");
    let raw = std::fs::read_to_string(&sources_path)
        .with_context(|| format!("reading bundle sources from {}", sources_path.display()))?;
    let doc: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| "parsing bundle sources JSON")?;

    let mut request = ForecastRequest::from_json(&doc).map_err(anyhow::Error::from)?;
    if request.bundle_id.is_none() {
        request.bundle_id = Some(args.bundle_id.clone());
        request
            .metadata
            .insert("bundle_id".into(), serde_json::json!(args.bundle_id));
    }

    // Offline template backend; swap in a hosted client for production runs.
    let engine = ForecastEngine::new(config, Arc::new(TemplateClient), None);

    match engine.run(request).await {
        Ok(run) => {
            info!(
                events = run.forecast.swell_events.len(),
                confidence = format!("{:.2}", run.synthesis.confidence),
                tokens = run.estimated_tokens,
                "Forecast complete"
            );
            println!("{}", run.narrative());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Forecast failed");
            std::process::exit(e.exit_code());
        }
    }
}
