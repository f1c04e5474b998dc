// crates/shared/src/logging/memory.rs

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{CustomerLogSink, LogLevel, LogSinkError};

/// In-memory sink used by tests to assert on the tenant-visible log lines.
#[derive(Default, Clone)]
pub struct MemorySink {
    pub lines: Arc<Mutex<Vec<(String, LogLevel, String)>>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(_, l, message)| *l == level && message.contains(needle))
    }
}

#[async_trait]
impl CustomerLogSink for MemorySink {
    async fn send(
        &self,
        stream: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LogSinkError> {
        if *self.should_fail.lock().unwrap() {
            return Err(LogSinkError::Delivery("mock sink failure".to_string()));
        }
        self.lines
            .lock()
            .unwrap()
            .push((stream.to_string(), level, message.to_string()));
        Ok(())
    }

    async fn export_to_s3(&self, _stream: &str, _bucket: &str) -> Result<(), LogSinkError> {
        Ok(())
    }
}
