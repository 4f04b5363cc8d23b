//! ==============================================================================
//! server.rs - browser dashboard
//! ==============================================================================
//!
//! purpose:
//!     serves what the poll loop renders. the loop never talks to http
//!     clients directly: it pushes a Frame into `DashboardHandle` once per
//!     cycle and the handlers read the latest snapshot.
//!
//! routes:
//!     GET  /           html dashboard (auto-refresh while monitoring)
//!     GET  /api        json snapshot
//!     GET  /chart.svg  latest trend chart
//!     POST /api/stop   raise the stop signal
//!     GET  /download   soil_logs.csv, once monitoring has stopped
//!
//! shared state:
//!     arc<rwlock<>> like any tokio host: the poll loop is the only writer,
//!     handlers are readers.
//!
//! ==============================================================================

use crate::chart;
use crate::display::{html_escape, Frame, MetricText};
use crate::domain::{ConnectionStatus, RollingSeries, SessionLog};
use crate::export::{self, EMPTY_NOTICE};
use crate::poller::{wall_clock, Renderer};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

// ==============================================================================
// dashboard state
// ==============================================================================

#[derive(Clone, Serialize)]
pub struct Dashboard {
    pub status: ConnectionStatus,
    pub metrics: MetricText,
    pub series: RollingSeries,
    pub cycle: u64,
    pub logged: usize,
    pub running: bool,
    /// wall clock of the last rendered cycle
    pub last_update: Option<String>,
    #[serde(skip)]
    chart_svg: String,
    /// handed over when the loop exits
    #[serde(skip)]
    export: Option<Arc<SessionLog>>,
}

impl Dashboard {
    pub fn new(max_points: usize) -> Self {
        let series = RollingSeries::new(max_points);
        Self {
            status: ConnectionStatus::default(),
            metrics: MetricText::default(),
            chart_svg: chart::render_svg(&series),
            series,
            cycle: 0,
            logged: 0,
            running: true,
            last_update: None,
            export: None,
        }
    }
}

/// cloneable handle the poll loop renders into
#[derive(Clone)]
pub struct DashboardHandle {
    inner: Arc<RwLock<Dashboard>>,
}

impl DashboardHandle {
    pub fn new(max_points: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Dashboard::new(max_points))),
        }
    }

    pub async fn snapshot(&self) -> Dashboard {
        self.inner.read().await.clone()
    }

    /// monitoring is over; make the session log downloadable
    pub async fn finish(&self, log: SessionLog) {
        let mut dash = self.inner.write().await;
        dash.running = false;
        dash.logged = log.len();
        dash.export = Some(Arc::new(log));
    }
}

impl Renderer for DashboardHandle {
    async fn render(&mut self, frame: Frame) {
        let mut dash = self.inner.write().await;
        dash.status = frame.status;
        dash.metrics = frame.metrics;
        dash.cycle = frame.cycle;
        dash.logged = frame.logged;
        dash.last_update = Some(wall_clock());
        if let Some(series) = frame.chart {
            dash.chart_svg = chart::render_svg(&series);
            dash.series = series;
        }
    }
}

// ==============================================================================
// web server
// ==============================================================================

#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardHandle,
    pub stop: CancellationToken,
    pub refresh_seconds: u64,
    pub file_name: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/chart.svg", get(chart_handler))
        .route("/api/stop", post(stop_handler))
        .route("/download", get(download_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// serve until `shutdown` is cancelled
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    info!("dashboard live at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("dashboard server error")?;
    Ok(())
}

async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let dash = state.dashboard.inner.read().await;
    let stopping = dash.running && state.stop.is_cancelled();
    Html(render_page(&dash, stopping, state.refresh_seconds, &state.file_name))
}

/// json api endpoint for programmatic access
async fn api_handler(State(state): State<AppState>) -> Json<Dashboard> {
    Json(state.dashboard.snapshot().await)
}

async fn chart_handler(State(state): State<AppState>) -> impl IntoResponse {
    let svg = state.dashboard.inner.read().await.chart_svg.clone();
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg)
}

async fn stop_handler(State(state): State<AppState>) -> Redirect {
    if !state.stop.is_cancelled() {
        info!("stop requested from dashboard");
        state.stop.cancel();
    }
    Redirect::to("/")
}

async fn download_handler(State(state): State<AppState>) -> Response {
    let dash = state.dashboard.inner.read().await;
    let log = match (&dash.export, dash.running) {
        (_, true) | (None, false) => {
            return (StatusCode::CONFLICT, "monitoring is still running").into_response();
        }
        (Some(log), false) => log,
    };
    if log.is_empty() {
        return (StatusCode::NOT_FOUND, EMPTY_NOTICE).into_response();
    }

    match export::to_csv(log) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", state.file_name),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ==============================================================================
// html
// ==============================================================================

/// `stopping`: stop was requested but the loop has not finished its cycle yet
fn render_page(dash: &Dashboard, stopping: bool, refresh_seconds: u64, file_name: &str) -> String {
    let refresh = if dash.running {
        format!(r#"<meta http-equiv="refresh" content="{}">"#, refresh_seconds.max(1))
    } else {
        String::new()
    };

    let status = match &dash.status {
        ConnectionStatus::Connected => r#"<span class="ok">🟢 Connected</span>"#.to_string(),
        ConnectionStatus::Disconnected(reason) => format!(
            r#"<span class="bad">🔴 Disconnected ({})</span>"#,
            html_escape(reason)
        ),
    };

    let footer = if stopping {
        r#"<p class="warn">⏳ Stopping… finishing the current cycle.</p>"#.to_string()
    } else if dash.running {
        r#"<form method="post" action="/api/stop"><button type="submit">Stop Monitoring</button></form>"#
            .to_string()
    } else {
        let download = if dash.logged > 0 {
            format!(
                r#"<a class="button" href="/download" download="{name}">Download CSV</a> <span class="muted">{n} readings</span>"#,
                name = html_escape(file_name),
                n = dash.logged
            )
        } else {
            format!(r#"<p class="info">{}</p>"#, EMPTY_NOTICE)
        };
        format!(
            r#"<p class="warn">🛑 Monitoring stopped by user.</p><hr><h2>📥 Download Logs</h2>{}"#,
            download
        )
    };

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
{refresh}
<title>SOIL SENSE</title>
<style>
body {{ font-family: system-ui; max-width: 860px; margin: 0 auto; padding: 2rem; background: #1a1a2e; color: #eee; }}
.metrics {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; margin-bottom: 1.5rem; }}
.metrics div {{ background: #16213e; padding: 1rem; border-radius: 8px; }}
.ok {{ color: #4ade80; }} .bad {{ color: #ff6b6b; }} .warn {{ color: #fbbf24; }} .info, .muted {{ color: #888; }}
.chart svg {{ width: 100%; height: auto; border-radius: 8px; }}
button, .button {{ background: #e94560; color: #fff; border: 0; padding: .6rem 1.2rem; border-radius: 6px; text-decoration: none; cursor: pointer; }}
</style>
</head>
<body>
<h1>🌱 SOIL SENSE - Soil &amp; Environment Monitor</h1>
<div class="metrics">
  <div>{status}</div>
  <div>🌡 <b>Temperature:</b> {temp}</div>
  <div>💧 <b>Humidity:</b> {hum}</div>
  <div>🌱 <b>Soil Moisture:</b> {moist}</div>
</div>
<div class="chart">{chart}</div>
<p class="muted">cycle {cycle} · {points}/{capacity} chart points · last update {updated}</p>
{footer}
</body>
</html>"#,
        refresh = refresh,
        status = status,
        temp = html_escape(&dash.metrics.temperature),
        hum = html_escape(&dash.metrics.humidity),
        moist = html_escape(&dash.metrics.moisture),
        chart = dash.chart_svg,
        cycle = dash.cycle,
        points = dash.series.len(),
        capacity = dash.series.capacity(),
        updated = dash.last_update.as_deref().unwrap_or("never"),
        footer = footer,
    )
}
