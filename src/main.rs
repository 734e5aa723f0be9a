//! camvisord: camera recording supervisor daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use camvisor::{Config, Fleet, HttpProbe};

#[derive(Parser)]
#[command(name = "camvisord")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Supervises camera recording processes", long_about = None)]
struct Cli {
    /// Path to the TOML configuration (defaults apply when omitted)
    #[arg(short, long, env = "CAMVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    cfg.validate().context("validating configuration")?;
    if cli.check {
        println!(
            "configuration ok: {} cameras, {} resource classes",
            cfg.cameras.len(),
            cfg.resource_classes.len()
        );
        return Ok(());
    }

    info!(
        root = %cfg.recording_root.display(),
        retention_days = cfg.retention_days,
        min_free_space_gb = cfg.min_free_space_gb,
        max_retries = cfg.max_retries,
        "camvisord starting"
    );

    let mut builder = Fleet::builder(cfg.clone());
    match HttpProbe::from_config(&cfg.gateway) {
        Ok(probe) => builder = builder.with_gateway_probe(Arc::new(probe)),
        Err(err) => warn!(error = %err, "gateway health monitor disabled"),
    }
    let fleet = builder.build().context("building fleet")?;

    fleet.run().await.context("fleet runtime")?;
    info!("camvisord stopped");
    Ok(())
}
