//! ==============================================================================
//! chart.rs - svg trend chart
//! ==============================================================================
//!
//! purpose:
//!     draws the rolling moisture and humidity series as a two-line chart.
//!     output is a standalone svg document, inlined into the dashboard page
//!     and also served on its own at /chart.svg.
//!
//! layout:
//!     800x300, "Soil Moisture & Humidity Trend", x = Time (labels rotated
//!     45 degrees), y = Percentage (%), legend in the top-right corner.
//!     points are evenly spaced by arrival order, one per reading.
//!
//! ==============================================================================

use crate::display::html_escape;
use crate::domain::RollingSeries;
use std::fmt::Write;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 300.0;
const LEFT: f64 = 60.0;
const RIGHT: f64 = 20.0;
const TOP: f64 = 36.0;
const BOTTOM: f64 = 80.0;

/// more x labels than this get thinned out
const MAX_X_LABELS: usize = 25;
const Y_TICKS: usize = 5;

pub const TITLE: &str = "Soil Moisture & Humidity Trend";

/// how one series is drawn
#[derive(Clone, Copy, Debug)]
pub struct SeriesStyle {
    pub label: &'static str,
    pub color: &'static str,
    pub marker: Marker,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Marker {
    Circle,
    Square,
}

pub const MOISTURE_STYLE: SeriesStyle = SeriesStyle {
    label: "Soil Moisture",
    color: "limegreen",
    marker: Marker::Circle,
};

pub const HUMIDITY_STYLE: SeriesStyle = SeriesStyle {
    label: "Humidity",
    color: "deepskyblue",
    marker: Marker::Square,
};

/// render the whole chart
pub fn render_svg(series: &RollingSeries) -> String {
    let moisture: Vec<f64> = series.moisture().collect();
    let humidity: Vec<f64> = series.humidity().collect();
    let labels: Vec<&str> = series.timestamps().collect();

    let (y_min, y_max) = if series.is_empty() {
        (0.0, 100.0)
    } else {
        y_range(moisture.iter().chain(humidity.iter()).copied())
    };
    let plot = Plot {
        n: labels.len(),
        y_min,
        y_max,
    };

    let mut svg = String::with_capacity(8 * 1024);
    // writes into a String cannot fail
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" font-family="sans-serif" font-size="11">"#,
        w = WIDTH,
        h = HEIGHT
    );
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = write!(
        svg,
        r#"<text x="{}" y="20" text-anchor="middle" font-size="14">{}</text>"#,
        WIDTH / 2.0,
        html_escape(TITLE)
    );

    plot.axes(&mut svg);
    plot.y_ticks(&mut svg);
    plot.x_labels(&mut svg, &labels);

    plot.line(&mut svg, &moisture, &MOISTURE_STYLE);
    plot.line(&mut svg, &humidity, &HUMIDITY_STYLE);
    legend(&mut svg, &[MOISTURE_STYLE, HUMIDITY_STYLE]);

    svg.push_str("</svg>");
    svg
}

/// padded value range
fn y_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 100.0);
    }
    // extreme values overflow the padded span
    let pad = ((max - min) * 0.1).max(1.0);
    let (lo, hi) = (min - pad, max + pad);
    if !(hi - lo).is_finite() {
        return (0.0, 100.0);
    }
    (lo, hi)
}

struct Plot {
    n: usize,
    y_min: f64,
    y_max: f64,
}

impl Plot {
    fn plot_width(&self) -> f64 {
        WIDTH - LEFT - RIGHT
    }

    fn plot_height(&self) -> f64 {
        HEIGHT - TOP - BOTTOM
    }

    fn x(&self, i: usize) -> f64 {
        if self.n <= 1 {
            return LEFT + self.plot_width() / 2.0;
        }
        LEFT + self.plot_width() * i as f64 / (self.n - 1) as f64
    }

    fn y(&self, v: f64) -> f64 {
        let span = self.y_max - self.y_min;
        // out-of-range points sit just past the frame instead of at huge coordinates
        let frac = ((v - self.y_min) / span).clamp(-0.5, 1.5);
        TOP + self.plot_height() * (1.0 - frac)
    }

    fn axes(&self, svg: &mut String) {
        let _ = write!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#333"/>"##,
            LEFT,
            TOP,
            self.plot_width(),
            self.plot_height()
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle">Time</text>"#,
            LEFT + self.plot_width() / 2.0,
            HEIGHT - 6.0
        );
        let _ = write!(
            svg,
            r#"<text x="14" y="{y}" text-anchor="middle" transform="rotate(-90 14 {y})">Percentage (%)</text>"#,
            y = TOP + self.plot_height() / 2.0
        );
    }

    fn y_ticks(&self, svg: &mut String) {
        for k in 0..Y_TICKS {
            let v = self.y_min + (self.y_max - self.y_min) * k as f64 / (Y_TICKS - 1) as f64;
            let y = self.y(v);
            let _ = write!(
                svg,
                r##"<line x1="{x0}" y1="{y:.1}" x2="{x1}" y2="{y:.1}" stroke="#ddd"/><text x="{tx}" y="{ty:.1}" text-anchor="end">{v:.1}</text>"##,
                x0 = LEFT,
                x1 = LEFT + self.plot_width(),
                tx = LEFT - 6.0,
                ty = y + 4.0,
            );
        }
    }

    fn x_labels(&self, svg: &mut String, labels: &[&str]) {
        let step = labels.len().div_ceil(MAX_X_LABELS).max(1);
        let y = TOP + self.plot_height() + 14.0;
        for (i, label) in labels.iter().enumerate().step_by(step) {
            let x = self.x(i);
            let _ = write!(
                svg,
                r#"<text class="x-label" x="{x:.1}" y="{y:.1}" text-anchor="end" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"#,
                html_escape(label)
            );
        }
    }

    fn line(&self, svg: &mut String, values: &[f64], style: &SeriesStyle) {
        if values.is_empty() {
            return;
        }
        let points: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:.1},{:.1}", self.x(i), self.y(*v)))
            .collect();
        let _ = write!(
            svg,
            r#"<polyline class="series" data-label="{}" points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            style.label,
            points.join(" "),
            style.color
        );
        for (i, v) in values.iter().enumerate() {
            marker(svg, style, self.x(i), self.y(*v));
        }
    }
}

fn marker(svg: &mut String, style: &SeriesStyle, x: f64, y: f64) {
    match style.marker {
        Marker::Circle => {
            let _ = write!(
                svg,
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="4" fill="{}"/>"#,
                style.color
            );
        }
        Marker::Square => {
            let _ = write!(
                svg,
                r#"<rect x="{:.1}" y="{:.1}" width="7" height="7" fill="{}"/>"#,
                x - 3.5,
                y - 3.5,
                style.color
            );
        }
    }
}

fn legend(svg: &mut String, styles: &[SeriesStyle]) {
    let x = WIDTH - RIGHT - 120.0;
    for (i, style) in styles.iter().enumerate() {
        let y = TOP + 14.0 + 18.0 * i as f64;
        let _ = write!(
            svg,
            r#"<line x1="{x}" y1="{y}" x2="{x2}" y2="{y}" stroke="{c}" stroke-width="2"/>"#,
            x2 = x + 24.0,
            c = style.color
        );
        marker(svg, style, x + 12.0, y);
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}">{}</text>"#,
            x + 30.0,
            y + 4.0,
            style.label
        );
    }
}
