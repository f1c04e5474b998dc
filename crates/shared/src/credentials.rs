// crates/shared/src/credentials.rs

use std::fmt;

use async_trait::async_trait;
use aws_config::SdkConfig;

/// Session name used for every cross-account role assumption, fixed so the
/// tenant's CloudTrail shows one recognizable principal.
pub const RULE_ASSUMPTION_SESSION: &str = "CollectLambdaRuleAssumption";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("unable to assume role {role_arn}: {message}")]
    AssumeRole { role_arn: String, message: String },
}

/// Temporary credentials for one tenant account, valid for the lifetime of
/// the invocation. Never refreshed.
#[derive(Clone)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl SessionCredentials {
    /// Static credentials provider for building per-tenant SDK clients.
    pub fn provider(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            Some(self.session_token.clone()),
            None,
            "TenantAssumedRole",
        )
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Port for acquiring cross-account credentials, once per invocation.
#[async_trait]
pub trait CredentialsVendor: Send + Sync {
    async fn assume_for_account(&self, account: &str)
    -> Result<SessionCredentials, CredentialsError>;
}

/// STS-backed vendor assuming `arn:aws:iam::<account>:role/<role>`.
pub struct StsCredentialsVendor {
    client: aws_sdk_sts::Client,
    role_name: String,
}

impl StsCredentialsVendor {
    pub fn new(config: &SdkConfig, role_name: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
            role_name: role_name.into(),
        }
    }
}

#[async_trait]
impl CredentialsVendor for StsCredentialsVendor {
    async fn assume_for_account(
        &self,
        account: &str,
    ) -> Result<SessionCredentials, CredentialsError> {
        let role_arn = format!("arn:aws:iam::{account}:role/{}", self.role_name);
        tracing::debug!(role_arn = %role_arn, "assuming cross-account role");

        let assumed = self
            .client
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(RULE_ASSUMPTION_SESSION)
            .send()
            .await
            .map_err(|e| CredentialsError::AssumeRole {
                role_arn: role_arn.clone(),
                message: e.to_string(),
            })?;

        let credentials = assumed
            .credentials()
            .ok_or_else(|| CredentialsError::AssumeRole {
                role_arn: role_arn.clone(),
                message: "response carried no credentials".to_string(),
            })?;

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
        })
    }
}
