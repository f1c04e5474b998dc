// crates/shared/src/logging/mod.rs
//
// Tenant-facing logging. Operational logging goes through `tracing`; this
// module is the separate sink that writes compilation outcomes into a log
// group the tenant can read.

pub mod cloudwatch;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use cloudwatch::CloudWatchLogSink;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemorySink;

/// Severity written into each tenant log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Critical,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Debug => "DEBUG",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error("log delivery failed: {0}")]
    Delivery(String),
}

/// Port for the per-tenant log group. One stream is created per event and
/// every stage appends to it, so the tenant sees one linear story per
/// configuration change.
#[async_trait]
pub trait CustomerLogSink: Send + Sync {
    async fn send(&self, stream: &str, level: LogLevel, message: &str)
    -> Result<(), LogSinkError>;

    /// Exports the stream to a tenant-owned bucket (last 29 days).
    async fn export_to_s3(&self, stream: &str, bucket: &str) -> Result<(), LogSinkError>;
}

/// Stream name for one event: `YYYY/MM/DD/HH/MM/<epoch-ms>`.
pub fn generate_log_stream_name(now: DateTime<Utc>) -> String {
    format!("{}/{}", now.format("%Y/%m/%d/%H/%M"), now.timestamp_millis())
}
