// crates/rule-collect/src/features/compile_event/adapter.rs

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::Filter;
use aws_sdk_sqs::types::MessageAttributeValue;
use aws_types::region::Region;
use bytes::Bytes;

use shared::credentials::SessionCredentials;
use shared::models::{CompilationMessage, MessageAttributes};

use super::error::CompileError;
use super::ports::{MessagePublisher, ObjectFetcher, PortResult, VpcGateway};

/// Reads the tenant's configuration object with the assumed-role
/// credentials.
pub struct S3ObjectFetcher {
    client: aws_sdk_s3::Client,
}

impl S3ObjectFetcher {
    pub fn new(credentials: &SessionCredentials, region: &str) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials.provider())
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ObjectFetcher for S3ObjectFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> PortResult<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| CompileError::ObjectStore(e.to_string()))?;
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| CompileError::ObjectStore(e.to_string()))?;
        Ok(body.into_bytes())
    }
}

/// Cross-account EC2 lookups in the region the configuration file names.
pub struct Ec2VpcGateway {
    client: aws_sdk_ec2::Client,
}

impl Ec2VpcGateway {
    pub fn new(credentials: &SessionCredentials, region: &str) -> Self {
        let config = aws_sdk_ec2::Config::builder()
            .behavior_version(aws_sdk_ec2::config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials.provider())
            .build();
        Self {
            client: aws_sdk_ec2::Client::from_conf(config),
        }
    }
}

#[async_trait]
impl VpcGateway for Ec2VpcGateway {
    async fn primary_cidr(&self, vpc_id: &str) -> PortResult<String> {
        let described = self
            .client
            .describe_vpcs()
            .vpc_ids(vpc_id)
            .send()
            .await
            .map_err(|e| {
                // A non-existent or malformed id is the tenant's mistake;
                // everything else is a collaborator failure.
                let code = e.code().unwrap_or_default().to_string();
                if code.starts_with("InvalidVpcID") || code.starts_with("InvalidVpcId") {
                    CompileError::InvalidVpc(vpc_id.to_string())
                } else {
                    CompileError::Ec2(e.to_string())
                }
            })?;

        described
            .vpcs()
            .first()
            .and_then(|vpc| vpc.cidr_block().map(str::to_string))
            .ok_or_else(|| CompileError::InvalidVpc(vpc_id.to_string()))
    }

    async fn attached_to_transit_gateway(&self, vpc_id: &str) -> PortResult<bool> {
        let filter = Filter::builder().name("resource-id").values(vpc_id).build();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .describe_transit_gateway_attachments()
                .filters(filter.clone());
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let page = request
                .send()
                .await
                .map_err(|e| CompileError::Ec2(e.to_string()))?;

            if !page.transit_gateway_attachments().is_empty() {
                return Ok(true);
            }
            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(false);
            }
        }
    }
}

/// Sends compilation messages onto the account-partitioned FIFO queue.
/// Deduplication is content-based on the queue itself.
pub struct SqsMessagePublisher {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsMessagePublisher {
    /// Resolves the queue URL once; reused for every message of the
    /// invocation.
    pub async fn resolve(config: &SdkConfig, queue_name: &str) -> Result<Self, CompileError> {
        let client = aws_sdk_sqs::Client::new(config);
        let queue_url = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| CompileError::Queue(e.to_string()))?
            .queue_url()
            .ok_or_else(|| CompileError::Queue(format!("queue {queue_name} has no url")))?
            .to_string();
        Ok(Self { client, queue_url })
    }

    fn string_attribute(value: &str) -> Result<MessageAttributeValue, CompileError> {
        MessageAttributeValue::builder()
            .data_type("String")
            .string_value(value)
            .build()
            .map_err(|e| CompileError::Queue(e.to_string()))
    }
}

#[async_trait]
impl MessagePublisher for SqsMessagePublisher {
    async fn publish(
        &self,
        message: &CompilationMessage,
        attributes: &MessageAttributes,
    ) -> PortResult<()> {
        let body = message
            .to_json()
            .map_err(|e| CompileError::Queue(e.to_string()))?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_group_id(attributes.group_id())
            .message_body(body)
            .message_attributes("Event", Self::string_attribute(&attributes.event.to_string())?)
            .message_attributes("Account", Self::string_attribute(&attributes.account)?)
            .message_attributes("Region", Self::string_attribute(&attributes.region)?)
            .message_attributes("Version", Self::string_attribute(&attributes.version)?)
            .message_attributes(
                "LogstreamName",
                Self::string_attribute(&attributes.logstream_name)?,
            )
            .send()
            .await
            .map_err(|e| CompileError::Queue(e.to_string()))?;
        Ok(())
    }
}
