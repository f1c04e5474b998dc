//! Collect-stage entry point: decode the trigger, assume the tenant role,
//! open the tenant log stream, run the compile use case and route faults.

use chrono::Utc;

use rule_collect::features::compile_event::{
    CollectEvent, CompileError, CompileEventDIContainer,
};
use shared::config::AppConfig;
use shared::credentials::CredentialsVendor;
use shared::logging::{generate_log_stream_name, CloudWatchLogSink, CustomerLogSink, LogLevel};
use shared::Fault;

use crate::composition_root::CompositionRoot;

pub async fn handle(
    root: &CompositionRoot,
    config: &AppConfig,
    event: serde_json::Value,
) -> anyhow::Result<()> {
    tracing::debug!("collect event received");
    let event = CollectEvent::from_event_bridge(&event)?;
    let account = event.account().to_string();
    let version = event.version().to_string();

    // Cross-account credentials, acquired once and valid for the whole
    // invocation.
    let credentials = root.credentials.assume_for_account(&account).await?;

    let sink = CloudWatchLogSink::new(
        &credentials,
        &config.lambda_region,
        config.log_group_name(),
        Some(version.clone()),
    );
    let stream = generate_log_stream_name(Utc::now());

    match &event {
        CollectEvent::ObjectPut { bucket, key, .. }
        | CollectEvent::ObjectDelete { bucket, key, .. } => {
            sink.send(
                &stream,
                LogLevel::Info,
                &format!("S3 event detected from {bucket}"),
            )
            .await?;
            sink.send(&stream, LogLevel::Info, &format!("Processing object: {key}"))
                .await?;
        }
        CollectEvent::VpcDelete { .. } => {}
    }

    let target_region = match event.target_region() {
        Ok(region) => region,
        Err(fault) => {
            route_fault(&sink, &stream, &fault).await;
            return Err(fault.into());
        }
    };

    let container = match CompileEventDIContainer::for_tenant(
        &root.env.sdk_config,
        &credentials,
        &target_region,
        config,
        Some(version),
    )
    .await
    {
        Ok(container) => container,
        Err(fault) => {
            route_fault(&sink, &stream, &fault).await;
            return Err(fault.into());
        }
    };

    match container.use_case.execute(&event, &stream).await {
        Ok(messages) => {
            tracing::info!(count = messages.len(), "compilation messages queued");
            sink.send(
                &stream,
                LogLevel::Info,
                "All rules processed and sent to SQS for execution.",
            )
            .await?;
            Ok(())
        }
        Err(fault) => {
            route_fault(&sink, &stream, &fault).await;
            Err(fault.into())
        }
    }
}

/// Writes the tenant-facing line for a failure, then lets the invocation
/// fail so the event source records it. Sink failures at this point only
/// get traced; the original fault must win.
async fn route_fault(sink: &CloudWatchLogSink, stream: &str, fault: &CompileError) {
    tracing::error!(kind = ?fault.kind(), error = %fault, "compile failed");
    if let Err(log_error) = sink
        .send(stream, LogLevel::Error, &fault.customer_message())
        .await
    {
        tracing::error!(error = %log_error, "unable to deliver tenant log line");
    }
}
