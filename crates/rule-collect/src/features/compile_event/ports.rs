// crates/rule-collect/src/features/compile_event/ports.rs

use async_trait::async_trait;
use bytes::Bytes;

use shared::models::{CompilationMessage, MessageAttributes};

use super::error::CompileError;

// Use a feature-specific error type for all port results.
pub type PortResult<T> = Result<T, CompileError>;

/// Port for reading the tenant's configuration object.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> PortResult<Bytes>;
}

/// Port for the cross-account VPC lookups the compiler needs: the primary
/// CIDR (which becomes the IP-set definition) and whether the VPC is
/// attached to a transit gateway at all.
#[async_trait]
pub trait VpcGateway: Send + Sync {
    async fn primary_cidr(&self, vpc_id: &str) -> PortResult<String>;

    async fn attached_to_transit_gateway(&self, vpc_id: &str) -> PortResult<bool>;
}

/// Port for handing one compilation result per VPC to the execute stage.
/// Messages of one account must be delivered in submission order.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(
        &self,
        message: &CompilationMessage,
        attributes: &MessageAttributes,
    ) -> PortResult<()>;
}
