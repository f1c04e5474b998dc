// crates/shared/src/logging/cloudwatch.rs

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_types::region::Region;
use chrono::{Duration, Utc};

use crate::credentials::SessionCredentials;

use super::{CustomerLogSink, LogLevel, LogSinkError};

const EXPORT_TASK_NAME: &str = "NFW_Customer_Log_Export";

/// Writes JSON lines into the tenant-owned CloudWatch log group, using the
/// assumed-role credentials so the data lands in the tenant account.
pub struct CloudWatchLogSink {
    client: aws_sdk_cloudwatchlogs::Client,
    log_group: String,
    version: Option<String>,
}

impl CloudWatchLogSink {
    pub fn new(
        credentials: &SessionCredentials,
        region: &str,
        log_group: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        let config = aws_sdk_cloudwatchlogs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials.provider())
            .build();
        Self {
            client: aws_sdk_cloudwatchlogs::Client::from_conf(config),
            log_group: log_group.into(),
            version,
        }
    }

    fn render(&self, level: LogLevel, message: &str) -> String {
        let line = match &self.version {
            Some(version) => serde_json::json!({
                "level": level.as_str(),
                "version": version,
                "message": message,
            }),
            None => serde_json::json!({
                "level": level.as_str(),
                "message": message,
            }),
        };
        line.to_string()
    }

    async fn ensure_stream(&self, stream: &str) -> Result<(), LogSinkError> {
        match self
            .client
            .create_log_stream()
            .log_group_name(&self.log_group)
            .log_stream_name(stream)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_resource_already_exists_exception() {
                    tracing::debug!(stream, log_group = %self.log_group, "log stream exists");
                    Ok(())
                } else {
                    Err(LogSinkError::Delivery(service_err.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl CustomerLogSink for CloudWatchLogSink {
    async fn send(
        &self,
        stream: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LogSinkError> {
        self.ensure_stream(stream).await?;

        let event = InputLogEvent::builder()
            .timestamp(Utc::now().timestamp_millis())
            .message(self.render(level, message))
            .build()
            .map_err(|e| LogSinkError::Delivery(e.to_string()))?;

        self.client
            .put_log_events()
            .log_group_name(&self.log_group)
            .log_stream_name(stream)
            .log_events(event)
            .send()
            .await
            .map_err(|e| LogSinkError::Delivery(e.to_string()))?;
        Ok(())
    }

    async fn export_to_s3(&self, stream: &str, bucket: &str) -> Result<(), LogSinkError> {
        let now = Utc::now();
        let from = now - Duration::days(29);
        self.client
            .create_export_task()
            .task_name(EXPORT_TASK_NAME)
            .log_group_name(&self.log_group)
            .log_stream_name_prefix(stream)
            .from(from.timestamp_millis())
            .to(now.timestamp_millis())
            .destination(bucket)
            .destination_prefix(stream)
            .send()
            .await
            .map_err(|e| LogSinkError::Delivery(e.to_string()))?;
        Ok(())
    }
}
