//! ==============================================================================
//! poller.rs - poll loop and session state
//! ==============================================================================
//!
//! purpose:
//!     owns everything collected during a monitoring session and runs the
//!     request -> parse -> update -> render -> sleep cycle until stopped.
//!
//! cycle:
//!
//!     ┌──────────────┐   PollOutcome   ┌──────────────┐   Frame   ┌──────────┐
//!     │ SensorSource │ ──────────────▶ │ Session      │ ────────▶ │ Renderer │
//!     └──────────────┘                 │  .apply()    │           └──────────┘
//!            ▲                         └──────────────┘                │
//!            │                                                         ▼
//!     stop token checked here  ◀──────────── Pacer::pause() ◀──────────┘
//!
//! display policy:
//!     a 200 response replaces all three metric texts with what that payload
//!     carried (missing field -> placeholder). failed cycles only touch the
//!     status; the metric texts keep their previous values.
//!
//! relationships:
//!     - used by: main.rs (runs the loop), server.rs (Renderer impl)
//!     - uses: sensor.rs (SensorSource), domain.rs, display.rs
//!
//! ==============================================================================

use crate::display::{Frame, MetricText};
use crate::domain::{ConnectionStatus, Reading, RollingSeries, SessionLog};
use crate::sensor::{PollOutcome, SensorSource};

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// per-cycle hook that shows the current state somewhere
pub trait Renderer {
    fn render(&mut self, frame: Frame) -> impl Future<Output = ()> + Send;
}

/// waits between cycles
pub trait Pacer {
    fn pause(&mut self) -> impl Future<Output = ()> + Send;
}

/// fixed sleep between cycles
pub struct IntervalPacer {
    interval: Duration,
}

impl IntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Pacer for IntervalPacer {
    async fn pause(&mut self) {
        tokio::time::sleep(self.interval).await;
    }
}

/// current local time as HH:MM:SS
pub fn wall_clock() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// what a single cycle changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleEffect {
    /// the reading added to series and log, if the payload was complete
    pub recorded: Option<Reading>,
    /// true on every 200 response
    pub chart_refresh: bool,
}

// ==============================================================================
// session state
// ==============================================================================

pub struct Session {
    series: RollingSeries,
    log: SessionLog,
    status: ConnectionStatus,
    metrics: MetricText,
    cycle: u64,
}

impl Session {
    pub fn new(max_points: usize) -> Self {
        Self {
            series: RollingSeries::new(max_points),
            log: SessionLog::new(),
            status: ConnectionStatus::default(),
            metrics: MetricText::default(),
            cycle: 0,
        }
    }

    /// fold one poll outcome into the session. no i/o.
    pub fn apply(&mut self, outcome: PollOutcome, now: &str) -> CycleEffect {
        self.cycle += 1;

        match outcome {
            PollOutcome::Reading(sample) => {
                self.status = ConnectionStatus::Connected;
                self.metrics = MetricText::from_sample(&sample);

                let recorded = sample.complete(now);
                if let Some(reading) = &recorded {
                    self.series.push(reading);
                    self.log.append(reading.clone());
                }
                CycleEffect {
                    recorded,
                    chart_refresh: true,
                }
            }
            PollOutcome::HttpError(code) => {
                self.status = ConnectionStatus::Disconnected(format!("HTTP {}", code.as_u16()));
                CycleEffect::default()
            }
            PollOutcome::TransportError(detail) | PollOutcome::ParseError(detail) => {
                self.status = ConnectionStatus::Disconnected(detail);
                CycleEffect::default()
            }
        }
    }

    /// snapshot for the renderer
    pub fn frame(&self, effect: &CycleEffect) -> Frame {
        Frame {
            cycle: self.cycle,
            status: self.status.clone(),
            metrics: self.metrics.clone(),
            chart: effect.chart_refresh.then(|| self.series.clone()),
            logged: self.log.len(),
        }
    }

    pub fn series(&self) -> &RollingSeries {
        &self.series
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn metrics(&self) -> &MetricText {
        &self.metrics
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn into_log(self) -> SessionLog {
        self.log
    }
}

// ==============================================================================
// poll loop
// ==============================================================================

/// run cycles until `stop` is cancelled, then hand the session back.
///
/// the token is only looked at before each request, so a stop raised while
/// a request or the pause is in flight takes effect at the next cycle.
pub async fn run<S, R, P>(
    source: &S,
    renderer: &mut R,
    pacer: &mut P,
    stop: &CancellationToken,
    mut session: Session,
    show_data: bool,
) -> Session
where
    S: SensorSource,
    R: Renderer,
    P: Pacer,
{
    loop {
        if stop.is_cancelled() {
            info!(
                cycles = session.cycles(),
                logged = session.log().len(),
                chart_points = session.series().len(),
                "monitoring stopped"
            );
            break;
        }

        let outcome = source.fetch().await;
        let effect = session.apply(outcome, &wall_clock());

        match (&effect.recorded, session.status()) {
            (Some(r), _) if show_data => {
                info!(
                    "[SENSOR] {} | Temp: {:.1}°C | Humidity: {:.1}% | Moisture: {:.1}%",
                    r.timestamp, r.temperature, r.humidity, r.moisture
                );
            }
            (None, status) if status.is_connected() => {
                debug!(metrics = ?session.metrics(), "incomplete reading, history unchanged");
            }
            (_, ConnectionStatus::Disconnected(reason)) => {
                warn!("[SENSOR] ⚠ {}", reason);
            }
            _ => {}
        }

        renderer.render(session.frame(&effect)).await;
        pacer.pause().await;
    }

    session
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sample;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn full(t: f64, h: f64, m: f64) -> PollOutcome {
        PollOutcome::Reading(Sample {
            temperature: Some(t),
            humidity: Some(h),
            moisture: Some(m),
        })
    }

    /// replays a script, then keeps returning a complete reading.
    /// cancels `stop` during fetch number `stop_on` (1-based).
    struct ScriptedSource {
        script: Mutex<VecDeque<PollOutcome>>,
        calls: AtomicUsize,
        stop: CancellationToken,
        stop_on: Option<usize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<PollOutcome>, stop: CancellationToken, stop_on: Option<usize>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                stop,
                stop_on,
            }
        }
    }

    impl SensorSource for ScriptedSource {
        async fn fetch(&self) -> PollOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.stop_on == Some(n) {
                self.stop.cancel();
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| full(21.0, 50.0, 30.0))
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Frame>,
    }

    impl Renderer for Recorder {
        async fn render(&mut self, frame: Frame) {
            self.frames.push(frame);
        }
    }

    #[derive(Default)]
    struct NoPause {
        pauses: usize,
    }

    impl Pacer for NoPause {
        async fn pause(&mut self) {
            self.pauses += 1;
        }
    }

    #[test]
    fn test_example_sequence() {
        let mut session = Session::new(50);
        session.apply(full(20.1, 55.0, 33.3), "10:00:00");
        session.apply(full(20.3, 54.0, 33.0), "10:00:02");
        let effect = session.apply(
            PollOutcome::Reading(Sample::default()),
            "10:00:04",
        );

        assert_eq!(session.log().len(), 2);
        assert_eq!(session.series().len(), 2);
        assert!(effect.recorded.is_none());
        assert!(effect.chart_refresh);
        assert_eq!(session.status(), &ConnectionStatus::Connected);
        assert_eq!(session.metrics(), &MetricText::default());
    }

    #[test]
    fn test_missing_moisture_leaves_history() {
        let mut session = Session::new(50);
        session.apply(full(20.1, 55.0, 33.3), "10:00:00");

        let partial = PollOutcome::Reading(Sample {
            temperature: Some(22.0),
            humidity: Some(60.0),
            moisture: None,
        });
        session.apply(partial, "10:00:02");

        assert_eq!(session.log().len(), 1);
        assert_eq!(session.series().len(), 1);
        assert_eq!(session.metrics().moisture, "-- %");
        assert_eq!(session.metrics().temperature, "22.0 °C");
    }

    #[test]
    fn test_non_200_keeps_state() {
        let mut session = Session::new(50);
        session.apply(full(20.1, 55.0, 33.3), "10:00:00");
        let before = session.metrics().clone();

        let effect = session.apply(PollOutcome::HttpError(StatusCode::INTERNAL_SERVER_ERROR), "10:00:02");

        assert_eq!(effect, CycleEffect::default());
        assert_eq!(
            session.status(),
            &ConnectionStatus::Disconnected("HTTP 500".into())
        );
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.series().len(), 1);
        assert_eq!(session.metrics(), &before);
    }

    #[test]
    fn test_transport_error_detail_surfaced() {
        let mut session = Session::new(50);
        session.apply(PollOutcome::TransportError("connection refused".into()), "10:00:00");
        assert_eq!(session.status().to_string(), "Disconnected (connection refused)");
        assert!(session.log().is_empty());
    }

    #[test]
    fn test_series_bounded_log_unbounded() {
        let mut session = Session::new(5);
        for i in 0..12 {
            session.apply(full(20.0, 50.0, i as f64), &format!("10:00:{:02}", i));
            assert_eq!(session.series().len(), (i + 1).min(5));
            assert_eq!(session.log().len(), i + 1);
        }
        let kept: Vec<f64> = session.series().moisture().collect();
        assert_eq!(kept, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_frame_chart_only_on_success() {
        let mut session = Session::new(50);
        let ok = session.apply(full(20.0, 50.0, 30.0), "10:00:00");
        assert!(session.frame(&ok).chart.is_some());

        let bad = session.apply(PollOutcome::ParseError("invalid json".into()), "10:00:02");
        let frame = session.frame(&bad);
        assert!(frame.chart.is_none());
        assert_eq!(frame.logged, 1);
        assert_eq!(frame.cycle, 2);
    }

    #[tokio::test]
    async fn test_stop_during_cycle_prevents_next_fetch() {
        let stop = CancellationToken::new();
        let source = ScriptedSource::new(vec![], stop.clone(), Some(3));
        let mut renderer = Recorder::default();
        let mut pacer = NoPause::default();

        let session = run(&source, &mut renderer, &mut pacer, &stop, Session::new(50), false).await;

        // cycle 3 finishes, cycle 4 never calls the device
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(renderer.frames.len(), 3);
        assert_eq!(pacer.pauses, 3);
        assert_eq!(session.log().len(), 3);
    }

    #[tokio::test]
    async fn test_stopped_before_start() {
        let stop = CancellationToken::new();
        stop.cancel();
        let source = ScriptedSource::new(vec![], stop.clone(), None);
        let mut renderer = Recorder::default();
        let mut pacer = NoPause::default();

        let session = run(&source, &mut renderer, &mut pacer, &stop, Session::new(50), true).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(renderer.frames.is_empty());
        assert_eq!(session.cycles(), 0);
    }

    #[tokio::test]
    async fn test_loop_renders_every_cycle() {
        let stop = CancellationToken::new();
        let script = vec![
            full(20.1, 55.0, 33.3),
            PollOutcome::HttpError(StatusCode::NOT_FOUND),
            PollOutcome::TransportError("timed out".into()),
            full(20.3, 54.0, 33.0),
        ];
        let source = ScriptedSource::new(script, stop.clone(), Some(4));
        let mut renderer = Recorder::default();
        let mut pacer = NoPause::default();

        let session = run(&source, &mut renderer, &mut pacer, &stop, Session::new(50), true).await;

        let statuses: Vec<bool> = renderer.frames.iter().map(|f| f.status.is_connected()).collect();
        assert_eq!(statuses, vec![true, false, false, true]);
        let charts: Vec<bool> = renderer.frames.iter().map(|f| f.chart.is_some()).collect();
        assert_eq!(charts, vec![true, false, false, true]);
        assert_eq!(session.into_log().len(), 2);
    }
}
