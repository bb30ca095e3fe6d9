//! Server-side log transports.
//!
//! The response interceptor writes through a [`Logger`], which fans each record
//! out to its transports. [`ConsoleTransport`] forwards to `tracing`;
//! [`MemoryTransport`] keeps records in memory for tests and embedders.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::config::LogsConfig;

const RESPONSE_TARGET: &str = "apikit::response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
}

/// A log line with structured context.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub context: Value,
}

/// A destination for log records.
///
/// Transports are shared between concurrent requests and must tolerate
/// concurrent calls.
pub trait LogTransport: Send + Sync {
    fn log(&self, record: &LogRecord);
}

/// Forwards records to `tracing` under the `apikit::response` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTransport;

impl LogTransport for ConsoleTransport {
    fn log(&self, record: &LogRecord) {
        let context = &record.context;
        match record.level {
            LogLevel::Error => {
                tracing::error!(target: RESPONSE_TARGET, error = %context, "{}", record.message);
            }
            LogLevel::Warn => {
                tracing::warn!(target: RESPONSE_TARGET, error = %context, "{}", record.message);
            }
            LogLevel::Info => {
                tracing::info!(target: RESPONSE_TARGET, context = %context, "{}", record.message);
            }
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogTransport for MemoryTransport {
    fn log(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// Fans records out to a list of transports.
#[derive(Clone, Default)]
pub struct Logger {
    transports: Vec<Arc<dyn LogTransport>>,
}

impl Logger {
    pub fn new(transports: Vec<Arc<dyn LogTransport>>) -> Self {
        Self { transports }
    }

    /// Console transport when `logs.console` is set, followed by any extra
    /// transports from the configuration.
    pub fn from_config(config: &LogsConfig) -> Self {
        let mut transports: Vec<Arc<dyn LogTransport>> = Vec::new();
        if config.console {
            transports.push(Arc::new(ConsoleTransport));
        }
        transports.extend(config.transports.iter().cloned());
        Self { transports }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, context: Value) {
        if self.transports.is_empty() {
            return;
        }
        let record = LogRecord {
            level,
            message: message.into(),
            context,
        };
        for transport in &self.transports {
            transport.log(&record);
        }
    }

    pub fn error(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Error, message, context);
    }

    pub fn is_silent(&self) -> bool {
        self.transports.is_empty()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("transports", &self.transports.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_console_disabled_without_transports_is_silent() {
        let logger = Logger::from_config(&LogsConfig {
            console: false,
            transports: Vec::new(),
        });
        assert!(logger.is_silent());
        logger.error("dropped", Value::Null);
    }

    #[test]
    fn test_memory_transport_receives_records() {
        let memory = MemoryTransport::new();
        let logger = Logger::from_config(&LogsConfig {
            console: true,
            transports: vec![Arc::new(memory.clone())],
        });

        logger.error("Service unavailable", json!({ "statusCode": 503 }));

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].message, "Service unavailable");
        assert_eq!(records[0].context["statusCode"], json!(503));

        memory.clear();
        assert!(memory.records().is_empty());
    }
}
