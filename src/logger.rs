//! Outcome sinks
//!
//! The runner reports every terminal outcome through a [`Logger`]: one record
//! per kernel configuration, and one record for a program-level failure.

use crate::config::DynamicParams;
use serde::Serialize;
use std::io::Write;

/// One reported outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub device: String,
    /// Absent for program-level outcomes
    pub kernel: Option<String>,
    pub params: Option<DynamicParams>,
    pub outcome: String,
    pub message: Option<String>,
}

/// Receives outcome records
pub trait Logger {
    fn log(&mut self, record: &LogRecord);
}

/// Forwards records to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogger;

impl Logger for FacadeLogger {
    fn log(&mut self, record: &LogRecord) {
        let kernel = record.kernel.as_deref().unwrap_or("<program>");
        let params = record
            .params
            .map(|p| format!(" {}", p))
            .unwrap_or_default();
        match &record.message {
            Some(message) => log::info!(
                "[{}] {}{}: {} ({})",
                record.device,
                kernel,
                params,
                record.outcome,
                message
            ),
            None => log::info!("[{}] {}{}: {}", record.device, kernel, params, record.outcome),
        }
    }
}

/// Writes one JSON object per line
pub struct JsonLinesLogger<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Logger for JsonLinesLogger<W> {
    fn log(&mut self, record: &LogRecord) {
        let written = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.writer));
        if let Err(e) = written {
            log::warn!("Failed to write log record: {}", e);
        }
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub records: Vec<LogRecord>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Logger for RecordingLogger {
    fn log(&mut self, record: &LogRecord) {
        self.records.push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> LogRecord {
        LogRecord {
            device: "cpu".to_string(),
            kernel: Some("A".to_string()),
            params: Some(DynamicParams::new(8, 2)),
            outcome: "PASS".to_string(),
            message: None,
        }
    }

    #[test]
    fn test_json_lines() {
        let mut logger = JsonLinesLogger::new(Vec::new());
        logger.log(&record());
        logger.log(&record());

        let text = String::from_utf8(logger.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["kernel"], "A");
        assert_eq!(value["params"]["local_size_x"], 2);
        assert_eq!(value["outcome"], "PASS");
        assert!(value["message"].is_null());
    }

    #[test]
    fn test_recording_logger() {
        let mut logger = RecordingLogger::new();
        logger.log(&record());
        assert_eq!(logger.records, vec![record()]);
    }

    #[test]
    fn test_facade_logger_accepts_program_records() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut logger = FacadeLogger;
        logger.log(&LogRecord {
            kernel: None,
            params: None,
            outcome: "NO_KERNELS_IN_PROGRAM".to_string(),
            ..record()
        });
    }
}
