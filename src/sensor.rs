//! ==============================================================================
//! sensor.rs - where readings come from
//! ==============================================================================
//!
//! purpose:
//!     one poll = one call to `SensorSource::fetch`, which always yields a
//!     `PollOutcome`. failures are values here, not errors: the poller decides
//!     what a failed cycle means for the dashboard.
//!
//! implementations:
//!     - HttpSensor: GET against the device endpoint (bounded timeout)
//!     - SimulatedSensor: deterministic readings for running without hardware
//!
//! relationships:
//!     - used by: poller.rs (one fetch per cycle), main.rs (picks the source)
//!     - produces: domain::Sample
//!
//! ==============================================================================

use crate::domain::Sample;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// result of a single poll
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// HTTP 200 with a json object body
    Reading(Sample),
    /// device answered with something other than 200
    HttpError(StatusCode),
    /// timeout, refused connection, dns failure...
    TransportError(String),
    /// 200 but the body was not a json object
    ParseError(String),
}

/// anything the poller can ask for a reading
pub trait SensorSource {
    fn fetch(&self) -> impl Future<Output = PollOutcome> + Send;
}

/// extract the three fields from a payload body.
///
/// missing, null and non-numeric fields all come back as `None`.
pub fn parse_payload(body: &str) -> Result<Sample, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("invalid json: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| format!("expected a json object, got: {}", truncate(body, 64)))?;

    let field = |name: &str| object.get(name).and_then(serde_json::Value::as_f64);

    Ok(Sample {
        temperature: field("temperature"),
        humidity: field("humidity"),
        moisture: field("moisture"),
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ==============================================================================
// http sensor
// ==============================================================================

pub struct HttpSensor {
    client: reqwest::Client,
    url: String,
}

impl HttpSensor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SensorSource for HttpSensor {
    async fn fetch(&self) -> PollOutcome {
        let response = match self.client.get(&self.url).send().await {
            Ok(r) => r,
            Err(e) => return PollOutcome::TransportError(error_chain(e)),
        };

        let status = response.status();
        if status != StatusCode::OK {
            debug!(%status, url = %self.url, "device returned non-200");
            return PollOutcome::HttpError(status);
        }

        // a body cut off mid-read is still a transport problem
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return PollOutcome::TransportError(error_chain(e)),
        };

        match parse_payload(&body) {
            Ok(sample) => PollOutcome::Reading(sample),
            Err(detail) => PollOutcome::ParseError(detail),
        }
    }
}

/// reqwest keeps the useful part (refused, timed out) in the source chain
fn error_chain(e: reqwest::Error) -> String {
    format!("{:#}", anyhow::Error::from(e))
}

// ==============================================================================
// simulated sensor
// ==============================================================================
// stands in for the device when `device.simulate` is set, so the dashboard
// can be exercised on a development machine.

#[derive(Default)]
pub struct SimulatedSensor {
    tick: AtomicU64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    fn sample_at(tick: u64) -> Sample {
        let t = tick as f64;
        let round = |v: f64| (v * 10.0).round() / 10.0;
        Sample {
            temperature: Some(round(22.0 + 2.0 * (t / 10.0).sin())),
            humidity: Some(round(55.0 + 5.0 * (t / 12.0).cos())),
            moisture: Some(round(40.0 + 8.0 * (t / 15.0).sin())),
        }
    }
}

impl SensorSource for SimulatedSensor {
    async fn fetch(&self) -> PollOutcome {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        PollOutcome::Reading(Self::sample_at(tick))
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Router};

    /// serve a fixed route on a loopback port and return its url
    async fn spawn_device(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/data", addr)
    }

    #[test]
    fn test_parse_full_payload() {
        let sample = parse_payload(r#"{"temperature":20.1,"humidity":55.0,"moisture":33.3}"#).unwrap();
        assert_eq!(sample.temperature, Some(20.1));
        assert_eq!(sample.humidity, Some(55.0));
        assert_eq!(sample.moisture, Some(33.3));
    }

    #[test]
    fn test_parse_missing_and_null_fields() {
        let sample = parse_payload(r#"{"temperature": null}"#).unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn test_parse_non_numeric_field_is_absent() {
        let sample = parse_payload(r#"{"temperature":"hot","humidity":40,"moisture":12.5}"#).unwrap();
        assert_eq!(sample.temperature, None);
        assert_eq!(sample.humidity, Some(40.0));
        assert_eq!(sample.moisture, Some(12.5));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_payload("[1,2,3]").is_err());
        assert!(parse_payload("not json").is_err());
    }

    #[tokio::test]
    async fn test_http_ok() {
        let app = Router::new().route(
            "/data",
            get(|| async { r#"{"temperature":21.5,"humidity":48.2,"moisture":30.0}"# }),
        );
        let url = spawn_device(app).await;
        let sensor = HttpSensor::new(url, Duration::from_secs(3)).unwrap();

        match sensor.fetch().await {
            PollOutcome::Reading(s) => {
                assert_eq!(s.temperature, Some(21.5));
                assert_eq!(s.moisture, Some(30.0));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_non_200() {
        let app = Router::new().route("/data", get(|| async { AxumStatus::SERVICE_UNAVAILABLE }));
        let url = spawn_device(app).await;
        let sensor = HttpSensor::new(url, Duration::from_secs(3)).unwrap();

        assert_eq!(
            sensor.fetch().await,
            PollOutcome::HttpError(StatusCode::SERVICE_UNAVAILABLE)
        );
    }

    #[tokio::test]
    async fn test_http_bad_body() {
        let app = Router::new().route("/data", get(|| async { "<html>oops</html>" }));
        let url = spawn_device(app).await;
        let sensor = HttpSensor::new(url, Duration::from_secs(3)).unwrap();

        assert!(matches!(sensor.fetch().await, PollOutcome::ParseError(_)));
    }

    #[tokio::test]
    async fn test_http_timeout() {
        let app = Router::new().route(
            "/data",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let url = spawn_device(app).await;
        let sensor = HttpSensor::new(url, Duration::from_millis(200)).unwrap();

        assert!(matches!(sensor.fetch().await, PollOutcome::TransportError(_)));
    }

    #[tokio::test]
    async fn test_http_connection_refused() {
        // grab a free port, then close it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sensor = HttpSensor::new(format!("http://{}/data", addr), Duration::from_secs(1)).unwrap();
        match sensor.fetch().await {
            PollOutcome::TransportError(detail) => assert!(!detail.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simulated_always_complete() {
        let sensor = SimulatedSensor::new();
        for _ in 0..20 {
            match sensor.fetch().await {
                PollOutcome::Reading(s) => assert!(s.complete("00:00:00").is_some()),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }
}
