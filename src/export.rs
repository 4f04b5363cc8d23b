//! ==============================================================================
//! export.rs - session log as csv
//! ==============================================================================
//!
//! format:
//!     Time,Temperature,Humidity,Soil Moisture
//!     10:41:07,20.1,55.0,33.3
//!
//!     one row per logged reading, in insertion order. floats go through the
//!     csv writer's shortest round-trip formatting so re-reading the file
//!     gives back exactly the logged values.
//!
//! ==============================================================================

use crate::domain::{Reading, SessionLog};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HEADER: [&str; 4] = ["Time", "Temperature", "Humidity", "Soil Moisture"];
pub const EMPTY_NOTICE: &str = "No data collected yet to download.";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv output was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected csv header: {0:?}")]
    Header(Vec<String>),
}

#[derive(Serialize)]
struct RowOut<'a> {
    #[serde(rename = "Time")]
    time: &'a str,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
    #[serde(rename = "Soil Moisture")]
    moisture: f64,
}

#[derive(Deserialize)]
struct RowIn {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
    #[serde(rename = "Soil Moisture")]
    moisture: f64,
}

/// encode the whole log. an empty log still gets the header row.
pub fn to_csv(log: &SessionLog) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if log.is_empty() {
        writer.write_record(HEADER)?;
    }
    for r in log.readings() {
        writer.serialize(RowOut {
            time: &r.timestamp,
            temperature: r.temperature,
            humidity: r.humidity,
            moisture: r.moisture,
        })?;
    }
    let bytes = writer.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

/// parse a file produced by `to_csv`
pub fn from_csv(text: &str) -> Result<SessionLog, ExportError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header != HEADER {
        return Err(ExportError::Header(header));
    }

    reader
        .deserialize::<RowIn>()
        .map(|row| -> Result<Reading, ExportError> {
            let row = row?;
            Ok(Reading {
                timestamp: row.time,
                temperature: row.temperature,
                humidity: row.humidity,
                moisture: row.moisture,
            })
        })
        .collect()
}

/// write the log to `<dir>/<file_name>`, creating `dir` if needed
pub fn write_file(log: &SessionLog, dir: &Path, file_name: &str) -> Result<PathBuf, ExportError> {
    let path = dir.join(file_name);
    let io_err = |source| ExportError::Io {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let body = to_csv(log)?;
    std::fs::write(&path, body).map_err(io_err)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> SessionLog {
        vec![
            Reading {
                timestamp: "10:00:00".into(),
                temperature: 20.1,
                humidity: 55.0,
                moisture: 33.3,
            },
            Reading {
                timestamp: "10:00:02".into(),
                temperature: 20.3,
                humidity: 54.0,
                moisture: 33.0,
            },
            Reading {
                timestamp: "10:00:04".into(),
                temperature: -3.125,
                humidity: 0.1 + 0.2,
                moisture: 1e-7,
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_header_and_rows() {
        let text = to_csv(&log()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Time,Temperature,Humidity,Soil Moisture");
        assert_eq!(lines[1], "10:00:00,20.1,55.0,33.3");
        assert_eq!(lines[2], "10:00:02,20.3,54.0,33.0");
        assert_eq!(lines.len(), 1 + log().len());
    }

    #[test]
    fn test_reparse_is_lossless() {
        let original = log();
        let parsed = from_csv(&to_csv(&original).unwrap()).unwrap();
        assert_eq!(parsed.readings(), original.readings());
    }

    #[test]
    fn test_empty_log_has_header_only() {
        let text = to_csv(&SessionLog::new()).unwrap();
        assert_eq!(text, "Time,Temperature,Humidity,Soil Moisture\n");
        assert!(from_csv(&text).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_header_rejected() {
        let err = from_csv("Time,Temp,Humidity,Moisture\n10:00:00,1,2,3\n").unwrap_err();
        assert!(matches!(err, ExportError::Header(_)));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let path = write_file(&log(), &target, "soil_logs.csv").unwrap();
        assert_eq!(path, target.join("soil_logs.csv"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(from_csv(&text).unwrap().len(), 3);
    }
}
