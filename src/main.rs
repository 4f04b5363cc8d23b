//! ==============================================================================
//! main.rs - soil sense entry point
//! ==============================================================================
//!
//! purpose:
//!     polls a soil-monitoring sensor over http, shows the latest readings and
//!     a rolling trend chart in a browser dashboard, and offers everything
//!     collected during the session as a csv download.
//!
//! responsibilities:
//!     - load configuration (soil.toml + command line overrides)
//!     - set up logging
//!     - serve the dashboard in the background
//!     - run the poll loop until stopped (dashboard button or ctrl-c)
//!     - hand the session log to the dashboard / disk for export
//!
//! relationships:
//!     - uses: config.rs (settings), sensor.rs (where readings come from)
//!     - uses: poller.rs (the loop), server.rs (dashboard + renderer)
//!     - uses: export.rs (csv file on exit)
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                     soil-sense (this file)                   │
//!     │  ┌──────────────┐  frames  ┌───────────────┐  http  ┌─────┐ │
//!     │  │ poll loop    │ ───────▶ │ dashboard     │ ─────▶ │ you │ │
//!     │  │ (2s cycle)   │          │ (port 3000)   │        └─────┘ │
//!     │  └──────┬───────┘          └───────┬───────┘                │
//!     │         │ GET /data                │ POST /api/stop         │
//!     │         ▼                          ▼                        │
//!     │  ┌──────────────┐          ┌───────────────┐                │
//!     │  │ sensor device│          │ stop token    │                │
//!     │  └──────────────┘          └───────────────┘                │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! stopping:
//!     the dashboard button stops polling but keeps the server up so the csv
//!     can be downloaded. ctrl-c stops polling and shuts everything down.
//!
//! ==============================================================================

mod chart;
mod config;
mod display;
mod domain;
mod export;
mod poller;
mod sensor;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::MonitorConfig;
use poller::{IntervalPacer, Session};
use sensor::{HttpSensor, SimulatedSensor};
use server::{AppState, DashboardHandle};

#[derive(Parser, Debug)]
#[command(name = "soil-sense", version, about = "Soil & environment monitor dashboard")]
struct Cli {
    /// path to soil.toml (default: config/soil.toml, then ../config/soil.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// sensor endpoint, overrides device.url
    #[arg(long)]
    url: Option<String>,

    /// dashboard address, overrides server.bind
    #[arg(long)]
    bind: Option<String>,

    /// generate readings locally instead of polling a device
    #[arg(long)]
    simulate: bool,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // startup banner
    println!("===========================================================");
    println!("  🌱 SOIL SENSE - Soil & Environment Monitor");
    println!("===========================================================");

    // step 1: load configuration
    let config = load_config(&cli)?;
    config.print_summary();

    // step 2: logging
    init_logging(&config.logging.level);

    // step 3: stop signals
    // shutdown ends everything; stop (its child) only ends polling
    let shutdown = CancellationToken::new();
    let stop = shutdown.child_token();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
                shutdown.cancel();
            }
        });
    }

    // step 4: dashboard in background
    let dashboard = DashboardHandle::new(config.history.max_points);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind dashboard on {}", config.server.bind))?;
    let app_state = AppState {
        dashboard: dashboard.clone(),
        stop: stop.clone(),
        refresh_seconds: config.polling.interval_seconds,
        file_name: config.export.file_name.clone(),
    };
    let server_task = tokio::spawn(server::serve(listener, app_state, shutdown.clone()));

    // step 5: poll until stopped
    info!("starting sensor polling ({}s interval)", config.polling.interval_seconds);
    let mut renderer = dashboard.clone();
    let mut pacer = IntervalPacer::new(config.poll_interval());
    let session = Session::new(config.history.max_points);
    let show_data = config.logging.show_sensor_data;

    let session = if config.device.simulate {
        let source = SimulatedSensor::new();
        poller::run(&source, &mut renderer, &mut pacer, &stop, session, show_data).await
    } else {
        let source = HttpSensor::new(&config.device.url, config.request_timeout())?;
        info!("polling {}", source.url());
        poller::run(&source, &mut renderer, &mut pacer, &stop, session, show_data).await
    };

    // step 6: export
    let log = session.into_log();
    if log.is_empty() {
        info!("{}", export::EMPTY_NOTICE);
    } else {
        info!(rows = log.len(), "session log ready for download at /download");
        if let Some(dir) = &config.export.directory {
            match export::write_file(&log, dir, &config.export.file_name) {
                Ok(path) => info!("wrote {}", path.display()),
                Err(e) => warn!("csv export failed: {}", e),
            }
        }
    }
    dashboard.finish(log).await;

    if !shutdown.is_cancelled() {
        info!("monitoring stopped; dashboard stays up for downloads (ctrl-c to exit)");
    }
    shutdown.cancelled().await;

    server_task.await.context("dashboard task panicked")??;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::load_or_default(),
    };

    if let Some(url) = &cli.url {
        config.device.url = url.clone();
    }
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if cli.simulate {
        config.device.simulate = true;
    }

    config.validate()?;
    Ok(config)
}

/// RUST_LOG wins over logging.level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
