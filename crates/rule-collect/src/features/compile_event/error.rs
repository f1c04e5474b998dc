// crates/rule-collect/src/features/compile_event/error.rs

use shared::{Fault, FaultKind};
use thiserror::Error;

/// Everything that can stop an event from compiling. Format variants are the
/// tenant's to fix and are written verbatim to their log group; the rest are
/// collaborator failures or bugs and only surface as "Please Contact
/// Support".
#[derive(Debug, Error)]
pub enum CompileError {
    // -- tenant-correctable ------------------------------------------------
    #[error("filename {0} not compliant with <region>-config.yaml pattern")]
    InvalidFileName(String),

    #[error("config file {key} not compliant with schema: {reason}")]
    SchemaViolation { key: String, reason: String },

    #[error("invalid VPC id {0}")]
    InvalidVpc(String),

    #[error("invalid format in rule {rule_key}:{rule} for {vpc}: {reason}")]
    InvalidRule {
        rule_key: String,
        rule: String,
        vpc: String,
        reason: String,
    },

    #[error("unsupported protocol in rule {rule_key}:{rule} for {vpc}")]
    UnsupportedProtocol {
        rule_key: String,
        rule: String,
        vpc: String,
    },

    // -- collaborator failures / bugs --------------------------------------
    #[error("unrecognized event: {0}")]
    UnrecognizedEvent(String),

    #[error("unable to load bundled data file: {0}")]
    BundledData(String),

    #[error("unable to acquire tenant credentials: {0}")]
    Credentials(String),

    #[error("unable to read configuration object: {0}")]
    ObjectStore(String),

    #[error("EC2 lookup failed: {0}")]
    Ec2(String),

    #[error("unable to queue compiled rules: {0}")]
    Queue(String),

    #[error("unable to write tenant log: {0}")]
    CustomerLog(String),
}

impl Fault for CompileError {
    fn kind(&self) -> FaultKind {
        match self {
            CompileError::InvalidFileName(_)
            | CompileError::SchemaViolation { .. }
            | CompileError::InvalidVpc(_)
            | CompileError::InvalidRule { .. }
            | CompileError::UnsupportedProtocol { .. } => FaultKind::Format,
            CompileError::UnrecognizedEvent(_)
            | CompileError::BundledData(_)
            | CompileError::Credentials(_)
            | CompileError::ObjectStore(_)
            | CompileError::Ec2(_)
            | CompileError::Queue(_)
            | CompileError::CustomerLog(_) => FaultKind::Internal,
        }
    }

    fn customer_message(&self) -> String {
        match self.kind() {
            FaultKind::Format => format!("Invalid Format: {self}"),
            FaultKind::Internal => "Please Contact Support: unable to process rules".to_string(),
        }
    }
}

impl From<shared::credentials::CredentialsError> for CompileError {
    fn from(e: shared::credentials::CredentialsError) -> Self {
        CompileError::Credentials(e.to_string())
    }
}

impl From<shared::logging::LogSinkError> for CompileError {
    fn from(e: shared::logging::LogSinkError) -> Self {
        CompileError::CustomerLog(e.to_string())
    }
}
