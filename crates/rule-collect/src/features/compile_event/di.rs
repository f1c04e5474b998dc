// crates/rule-collect/src/features/compile_event/di.rs

use std::sync::Arc;

use aws_config::SdkConfig;

use shared::config::AppConfig;
use shared::credentials::SessionCredentials;
use shared::logging::{CloudWatchLogSink, CustomerLogSink};

use crate::domain::{DocumentSchema, ProtocolTable, RuleSynthesizer};

use super::adapter::{Ec2VpcGateway, S3ObjectFetcher, SqsMessagePublisher};
use super::error::CompileError;
use super::ports::{MessagePublisher, ObjectFetcher, VpcGateway};
use super::use_case::CompileEventUseCase;

/// The dependency injection container for the compile-event feature.
pub struct CompileEventDIContainer {
    pub use_case: Arc<CompileEventUseCase>,
}

impl CompileEventDIContainer {
    /// Wires up the dependencies for this feature.
    pub fn new(
        objects: Arc<dyn ObjectFetcher>,
        vpcs: Arc<dyn VpcGateway>,
        publisher: Arc<dyn MessagePublisher>,
        customer_log: Arc<dyn CustomerLogSink>,
        schema: DocumentSchema,
        synthesizer: RuleSynthesizer,
    ) -> Self {
        let use_case = Arc::new(CompileEventUseCase::new(
            objects,
            vpcs,
            publisher,
            customer_log,
            schema,
            synthesizer,
        ));
        Self { use_case }
    }

    /// Convenience function wiring production adapters for one tenant
    /// invocation. The S3 and CloudWatch clients run in the worker's own
    /// region with the assumed-role credentials; the EC2 client runs in the
    /// region the configuration file targets.
    pub async fn for_tenant(
        base_config: &SdkConfig,
        credentials: &SessionCredentials,
        target_region: &str,
        config: &AppConfig,
        version: Option<String>,
    ) -> Result<Self, CompileError> {
        let objects = Arc::new(S3ObjectFetcher::new(credentials, &config.lambda_region));
        let vpcs = Arc::new(Ec2VpcGateway::new(credentials, target_region));
        let publisher =
            Arc::new(SqsMessagePublisher::resolve(base_config, &config.queue_name).await?);
        let customer_log = Arc::new(CloudWatchLogSink::new(
            credentials,
            &config.lambda_region,
            config.log_group_name(),
            version,
        ));

        let schema = DocumentSchema::bundled()
            .map_err(|e| CompileError::BundledData(e.to_string()))?;
        let protocols = ProtocolTable::bundled()
            .map_err(|e| CompileError::BundledData(e.to_string()))?;
        let synthesizer = RuleSynthesizer::new(protocols, config.default_action_order());

        Ok(Self::new(
            objects,
            vpcs,
            publisher,
            customer_log,
            schema,
            synthesizer,
        ))
    }
}
