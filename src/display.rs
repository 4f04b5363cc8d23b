//! what the dashboard shows for the current cycle

use crate::domain::{ConnectionStatus, RollingSeries, Sample};
use serde::Serialize;

pub const PLACEHOLDER: &str = "--";

/// one-decimal value with unit, or the placeholder
pub fn format_metric(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1} {}", v, unit),
        None => format!("{} {}", PLACEHOLDER, unit),
    }
}

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// the three live metric texts
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricText {
    pub temperature: String,
    pub humidity: String,
    pub moisture: String,
}

impl MetricText {
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            temperature: format_metric(sample.temperature, "°C"),
            humidity: format_metric(sample.humidity, "%"),
            moisture: format_metric(sample.moisture, "%"),
        }
    }
}

impl Default for MetricText {
    fn default() -> Self {
        Self::from_sample(&Sample::default())
    }
}

/// handed to the renderer once per cycle
#[derive(Clone, Debug)]
pub struct Frame {
    pub cycle: u64,
    pub status: ConnectionStatus,
    pub metrics: MetricText,
    /// `Some` only when the chart should be redrawn this cycle
    pub chart: Option<RollingSeries>,
    pub logged: usize,
}
