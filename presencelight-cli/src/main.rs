//! Presencelight — mirror a presence status onto a physical light.
//!
//! # Usage
//!
//! ```text
//! presencelight run [--config <path>]
//! presencelight check-config [--config <path>]
//! ```
//!
//! The config file selects one status source (log-file, cloud-directory,
//! desktop-automation) and one light (relay-pair, rgb). `run` polls the
//! source until ctrl-c and keeps the light in step; `check-config` loads
//! and validates the file, then exits.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use presencelight_core::{config, Config, LightActuator, LightConfig, SourceConfig, StatusSource};
use presencelight_light::{ChromaRestDevice, HttpRelaySwitch, RelayPairLight, RgbPeripheralLight};
use presencelight_source::{CloudDirectorySource, LogFileSource, RestDirectoryApi};
use presencelight_sync::SyncService;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "presencelight",
    version,
    about = "Keep a physical light in step with your presence status",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the configured source and drive the configured light until ctrl-c.
    Run {
        /// Configuration file (default: <config dir>/presencelight/config.yaml).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Load and validate the configuration file, then exit.
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run(config),
        Commands::CheckConfig { config } => check_config(config),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let path = resolve_config_path(path)?;
    let config = config::load(&path)
        .with_context(|| format!("invalid configuration at {}", path.display()))?;
    println!(
        "ok: {} source, {} light, {} policy",
        source_label(&config.source),
        light_label(&config.light),
        config.apply_policy
    );
    Ok(())
}

fn run(path: Option<PathBuf>) -> Result<()> {
    let path = resolve_config_path(path)?;
    let config = config::load(&path)
        .with_context(|| format!("invalid configuration at {}", path.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("tokio runtime")?;
    runtime.block_on(run_async(config))
}

async fn run_async(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let source = build_source(&config.source)?;
    let light = build_light(&config.light, cancel.clone())?;

    let (service, mut status_rx) = SyncService::new(source, light, config.apply_policy);

    // Log every status transition the loop observes, independent of the
    // apply policy.
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            info!(status = %status, "presence status");
        }
    });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, shutting down");
            signal_cancel.cancel();
        }
    });

    service.run(cancel).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Adapter factories
// ---------------------------------------------------------------------------

fn build_source(config: &SourceConfig) -> Result<Box<dyn StatusSource>> {
    match config {
        SourceConfig::LogFile(log) => Ok(Box::new(LogFileSource::new(log)?)),
        SourceConfig::CloudDirectory(cloud) => {
            let api = RestDirectoryApi::new(cloud.clone())
                .context("building cloud directory client")?;
            Ok(Box::new(CloudDirectorySource::new(cloud, Box::new(api))?))
        }
        SourceConfig::DesktopAutomation(_) => {
            bail!(
                "the desktop-automation source needs a platform UI automation \
                 backend, and none is linked into this build; use the log-file \
                 or cloud-directory source instead"
            )
        }
    }
}

fn build_light(config: &LightConfig, cancel: CancellationToken) -> Result<Box<dyn LightActuator>> {
    match config {
        LightConfig::RelayPair(relay) => {
            let transport = HttpRelaySwitch::new(relay).context("building relay transport")?;
            Ok(Box::new(RelayPairLight::new(Box::new(transport), cancel)))
        }
        LightConfig::Rgb(rgb) => {
            let device = ChromaRestDevice::new(rgb).context("building rgb bridge client")?;
            Ok(Box::new(RgbPeripheralLight::new(
                Box::new(device),
                rgb.headset_only,
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let base = dirs::config_dir().context("could not determine the user config directory")?;
    Ok(base.join("presencelight").join("config.yaml"))
}

fn source_label(source: &SourceConfig) -> &'static str {
    match source {
        SourceConfig::LogFile(_) => "log-file",
        SourceConfig::CloudDirectory(_) => "cloud-directory",
        SourceConfig::DesktopAutomation(_) => "desktop-automation",
    }
}

fn light_label(light: &LightConfig) -> &'static str {
    match light {
        LightConfig::RelayPair(_) => "relay-pair",
        LightConfig::Rgb(_) => "rgb",
    }
}
