// crates/rule-collect/src/features/compile_event/use_case.rs

use std::sync::Arc;

use shared::RuleEvent;
use shared::logging::{CustomerLogSink, LogLevel};
use shared::models::{CompilationMessage, MessageAttributes};

use crate::domain::{DocumentSchema, RuleSet, RuleSynthesizer, SynthesisError};

use super::dto::{region_from_object_key, CollectEvent};
use super::error::CompileError;
use super::ports::{MessagePublisher, ObjectFetcher, VpcGateway};

/// Compiles one trigger event into compilation messages, one per VPC, and
/// hands them to the execute stage. Emission is all-or-nothing: no message
/// leaves this use case until every referenced VPC compiled cleanly.
pub struct CompileEventUseCase {
    objects: Arc<dyn ObjectFetcher>,
    vpcs: Arc<dyn VpcGateway>,
    publisher: Arc<dyn MessagePublisher>,
    customer_log: Arc<dyn CustomerLogSink>,
    schema: DocumentSchema,
    synthesizer: RuleSynthesizer,
}

impl CompileEventUseCase {
    pub fn new(
        objects: Arc<dyn ObjectFetcher>,
        vpcs: Arc<dyn VpcGateway>,
        publisher: Arc<dyn MessagePublisher>,
        customer_log: Arc<dyn CustomerLogSink>,
        schema: DocumentSchema,
        synthesizer: RuleSynthesizer,
    ) -> Self {
        Self {
            objects,
            vpcs,
            publisher,
            customer_log,
            schema,
            synthesizer,
        }
    }

    pub async fn execute(
        &self,
        event: &CollectEvent,
        log_stream: &str,
    ) -> Result<Vec<CompilationMessage>, CompileError> {
        match event {
            CollectEvent::ObjectPut {
                account,
                bucket,
                key,
                version,
            } => {
                self.object_put(account, bucket, key, version, log_stream)
                    .await
            }
            CollectEvent::ObjectDelete { account, key, .. } => {
                self.object_delete(account, key, log_stream).await
            }
            CollectEvent::VpcDelete {
                account,
                region,
                vpc_id,
            } => self.vpc_delete(account, region, vpc_id, log_stream).await,
        }
    }

    async fn object_put(
        &self,
        account: &str,
        bucket: &str,
        key: &str,
        version: &str,
        log_stream: &str,
    ) -> Result<Vec<CompilationMessage>, CompileError> {
        let region = region_from_object_key(key)?;
        tracing::info!(account, region = %region, key, "processing configuration object");
        self.customer_log
            .send(
                log_stream,
                LogLevel::Info,
                &format!("Processing rules for Account {account} in region {region}"),
            )
            .await?;

        let body = self.objects.fetch(bucket, key).await?;
        let body = std::str::from_utf8(&body)
            .map_err(|e| CompileError::ObjectStore(format!("object body is not UTF-8: {e}")))?
            .to_string();

        let document = self.schema.parse_and_validate(&body).map_err(|e| match e {
            crate::domain::SchemaError::Load(reason) => CompileError::BundledData(reason),
            other => {
                tracing::warn!(key, error = %other, "configuration document rejected");
                CompileError::SchemaViolation {
                    key: key.to_string(),
                    reason: other.to_string(),
                }
            }
        })?;

        let mut compiled: Vec<CompilationMessage> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for policy in &document.config {
            let cidr = self.vpcs.primary_cidr(&policy.vpc).await?;

            // Rules are only materialized for VPCs whose traffic actually
            // reaches the firewall.
            if !self.vpcs.attached_to_transit_gateway(&policy.vpc).await? {
                tracing::info!(vpc = %policy.vpc, "skipped: not attached to a transit gateway");
                skipped.push(policy.vpc.clone());
                continue;
            }

            let mut set = RuleSet::new(&policy.vpc, account, &region, &document.version);
            set.set_cidr(cidr);

            for (rule_key, spec) in policy.rule_specs() {
                let rule_key = rule_key.to_lowercase();
                self.synthesizer
                    .add_rule(&mut set, &rule_key, spec)
                    .map_err(|e| match e {
                        SynthesisError::UnsupportedProtocol(_) => {
                            CompileError::UnsupportedProtocol {
                                rule_key: rule_key.clone(),
                                rule: spec.to_string(),
                                vpc: policy.vpc.clone(),
                            }
                        }
                        other => CompileError::InvalidRule {
                            rule_key: rule_key.clone(),
                            rule: spec.to_string(),
                            vpc: policy.vpc.clone(),
                            reason: other.to_string(),
                        },
                    })?;
            }

            compiled.push(set.into_message());
        }

        for vpc in &skipped {
            self.customer_log
                .send(
                    log_stream,
                    LogLevel::Warn,
                    &format!("{vpc} rules skipped as it is not attached to TGW"),
                )
                .await?;
        }

        for message in &compiled {
            let attributes = MessageAttributes {
                event: RuleEvent::Update,
                account: account.to_string(),
                region: message.region.clone(),
                version: version.to_string(),
                logstream_name: log_stream.to_string(),
            };
            self.publisher.publish(message, &attributes).await?;
            tracing::info!(vpc = %message.vpc, account, "sent compiled rules for processing");
        }

        Ok(compiled)
    }

    async fn object_delete(
        &self,
        account: &str,
        key: &str,
        log_stream: &str,
    ) -> Result<Vec<CompilationMessage>, CompileError> {
        let region = region_from_object_key(key)?;
        tracing::info!(account, region = %region, "configuration object deleted");
        self.customer_log
            .send(
                log_stream,
                LogLevel::Info,
                &format!("All rules for {account} in {region} will be deleted"),
            )
            .await?;

        let message = CompilationMessage::empty(account, "", region.clone());
        let attributes = MessageAttributes {
            event: RuleEvent::DeleteS3,
            account: account.to_string(),
            region,
            version: "delete".to_string(),
            logstream_name: log_stream.to_string(),
        };
        self.publisher.publish(&message, &attributes).await?;
        Ok(vec![message])
    }

    async fn vpc_delete(
        &self,
        account: &str,
        region: &str,
        vpc_id: &str,
        log_stream: &str,
    ) -> Result<Vec<CompilationMessage>, CompileError> {
        tracing::info!(account, vpc_id, "VPC delete event detected");
        self.customer_log
            .send(
                log_stream,
                LogLevel::Info,
                &format!("DeleteVpc event detected from {vpc_id}"),
            )
            .await?;

        let message =
            CompilationMessage::empty(account, vpc_id.replace("vpc-", ""), region.to_string());
        let attributes = MessageAttributes {
            event: RuleEvent::DeleteVpc,
            account: account.to_string(),
            region: region.to_string(),
            version: vpc_id.to_string(),
            logstream_name: log_stream.to_string(),
        };
        self.publisher.publish(&message, &attributes).await?;
        Ok(vec![message])
    }
}
