use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// the three optional values pulled out of one sensor payload
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    /// temperature in celsius
    pub temperature: Option<f64>,
    /// relative humidity (0-100%)
    pub humidity: Option<f64>,
    /// soil moisture (0-100%)
    pub moisture: Option<f64>,
}

impl Sample {
    /// promote to a reading when every field is present
    pub fn complete(&self, timestamp: impl Into<String>) -> Option<Reading> {
        Some(Reading {
            timestamp: timestamp.into(),
            temperature: self.temperature?,
            humidity: self.humidity?,
            moisture: self.moisture?,
        })
    }
}

/// one timestamped sample with every value present
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    /// wall-clock time, HH:MM:SS
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub moisture: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason")]
pub enum ConnectionStatus {
    Connected,
    Disconnected(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Disconnected("waiting for first poll".to_string())
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Disconnected(reason) => write!(f, "Disconnected ({})", reason),
        }
    }
}

/// fixed-capacity chart history.
///
/// timestamps, moisture and humidity always have the same length,
/// never more than `capacity`. the oldest point is dropped first.
#[derive(Clone, Debug, Serialize)]
pub struct RollingSeries {
    capacity: usize,
    timestamps: VecDeque<String>,
    moisture: VecDeque<f64>,
    humidity: VecDeque<f64>,
}

impl RollingSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            timestamps: VecDeque::with_capacity(capacity + 1),
            moisture: VecDeque::with_capacity(capacity + 1),
            humidity: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, reading: &Reading) {
        self.timestamps.push_back(reading.timestamp.clone());
        self.moisture.push_back(reading.moisture);
        self.humidity.push_back(reading.humidity);

        while self.timestamps.len() > self.capacity {
            self.timestamps.pop_front();
            self.moisture.pop_front();
            self.humidity.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timestamps(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.timestamps.iter().map(String::as_str)
    }

    pub fn moisture(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.moisture.iter().copied()
    }

    pub fn humidity(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.humidity.iter().copied()
    }
}

/// everything recorded this session, for export. never trimmed.
#[derive(Clone, Debug, Default)]
pub struct SessionLog {
    readings: Vec<Reading>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }
}

impl FromIterator<Reading> for SessionLog {
    fn from_iter<I: IntoIterator<Item = Reading>>(iter: I) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}
