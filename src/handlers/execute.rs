//! Execute-stage entry point: walk the queue records of one invocation and
//! reconcile each onto the firewall. Records arrive one account at a time
//! thanks to the FIFO group id.

use rule_execute::features::apply_rules::{ApplyRulesDIContainer, ReconcileError};
use shared::config::AppConfig;
use shared::credentials::CredentialsVendor;
use shared::logging::{CloudWatchLogSink, CustomerLogSink, LogLevel};
use shared::models::{CompilationMessage, MessageAttributes};
use shared::{Fault, RuleEvent};

use crate::composition_root::CompositionRoot;

pub async fn handle(
    root: &CompositionRoot,
    config: &AppConfig,
    event: serde_json::Value,
) -> anyhow::Result<()> {
    let records = event["Records"].as_array().cloned().unwrap_or_default();
    tracing::debug!(count = records.len(), "queue records received");

    for record in records {
        let attributes = decode_attributes(&record)?;
        let body = record["body"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("queue record without body"))?;
        let message = CompilationMessage::from_json(body)?;

        let credentials = root
            .credentials
            .assume_for_account(&attributes.account)
            .await?;
        let sink = CloudWatchLogSink::new(
            &credentials,
            &config.lambda_region,
            config.log_group_name(),
            Some(attributes.version.clone()),
        );

        let container = ApplyRulesDIContainer::for_record(
            &root.env.sdk_config,
            &credentials,
            config,
            &root.env.caller_account,
            Some(attributes.version.clone()),
        )?;

        tracing::info!(
            account = %attributes.account,
            region = %attributes.region,
            event = %attributes.event,
            "started processing rules"
        );
        sink.send(
            &attributes.logstream_name,
            LogLevel::Info,
            &format!(
                "Started processing rules for {} in {}",
                attributes.account, attributes.region
            ),
        )
        .await?;

        match container.use_case.execute(&message, &attributes).await {
            Ok(()) => {
                sink.send(
                    &attributes.logstream_name,
                    LogLevel::Info,
                    &format!(
                        "Rules processed successfully for {} in {}",
                        attributes.account, attributes.region
                    ),
                )
                .await?;
            }
            Err(fault) => {
                route_fault(&sink, &attributes.logstream_name, &fault).await;
                return Err(fault.into());
            }
        }
    }
    Ok(())
}

fn decode_attributes(record: &serde_json::Value) -> anyhow::Result<MessageAttributes> {
    let attr = |name: &str| -> anyhow::Result<String> {
        record["messageAttributes"][name]["stringValue"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("queue record without {name} attribute"))
    };

    Ok(MessageAttributes {
        event: attr("Event")?.parse::<RuleEvent>()?,
        account: attr("Account")?,
        region: attr("Region")?,
        version: attr("Version")?,
        logstream_name: attr("LogstreamName")?,
    })
}

async fn route_fault(sink: &CloudWatchLogSink, stream: &str, fault: &ReconcileError) {
    tracing::error!(kind = ?fault.kind(), error = %fault, "reconcile failed");
    if let Err(log_error) = sink
        .send(stream, LogLevel::Error, &fault.customer_message())
        .await
    {
        tracing::error!(error = %log_error, "unable to deliver tenant log line");
    }
}
