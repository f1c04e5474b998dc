// crates/rule-execute/src/features/apply_rules/error.rs

use shared::{Fault, FaultKind};
use thiserror::Error;

use super::ports::FirewallApiError;

/// Failures of the reconcile stage. The inputs here are system-produced
/// compilation messages, not tenant documents, so everything is internal:
/// the tenant can never fix a reconcile failure themselves.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("firewall api: {0}")]
    Firewall(#[from] FirewallApiError),

    #[error("malformed compilation message: {0}")]
    MalformedMessage(String),

    #[error("timed out waiting for rule group deletion: {0}")]
    DeleteTimeout(String),

    #[error("unable to load bundled data file: {0}")]
    BundledData(String),

    #[error("unable to write tenant log: {0}")]
    CustomerLog(String),
}

impl Fault for ReconcileError {
    fn kind(&self) -> FaultKind {
        FaultKind::Internal
    }

    fn customer_message(&self) -> String {
        "Please Contact Support: unable to process rules".to_string()
    }
}

impl From<shared::logging::LogSinkError> for ReconcileError {
    fn from(e: shared::logging::LogSinkError) -> Self {
        ReconcileError::CustomerLog(e.to_string())
    }
}
