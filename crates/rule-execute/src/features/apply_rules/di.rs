// crates/rule-execute/src/features/apply_rules/di.rs

use std::sync::Arc;

use aws_config::SdkConfig;

use shared::config::AppConfig;
use shared::credentials::SessionCredentials;
use shared::logging::{CloudWatchLogSink, CustomerLogSink};

use crate::domain::DefaultDenyRules;

use super::adapter::SdkFirewallProvider;
use super::error::ReconcileError;
use super::ports::FirewallProvider;
use super::use_case::{ApplyRulesUseCase, ReconcilerSettings};

/// The dependency injection container for the apply-rules feature.
pub struct ApplyRulesDIContainer {
    pub use_case: Arc<ApplyRulesUseCase>,
}

impl ApplyRulesDIContainer {
    /// Wires up the dependencies for this feature.
    pub fn new(
        firewall: Arc<dyn FirewallProvider>,
        customer_log: Arc<dyn CustomerLogSink>,
        default_deny: DefaultDenyRules,
        settings: ReconcilerSettings,
    ) -> Self {
        let use_case = Arc::new(ApplyRulesUseCase::new(
            firewall,
            customer_log,
            default_deny,
            settings,
        ));
        Self { use_case }
    }

    /// Convenience function wiring production dependencies for one queue
    /// record. The firewall clients use the worker's own credentials; the
    /// customer log sink uses the tenant's assumed-role credentials.
    pub fn for_record(
        base_config: &SdkConfig,
        tenant_credentials: &SessionCredentials,
        config: &AppConfig,
        firewall_account: &str,
        version: Option<String>,
    ) -> Result<Self, ReconcileError> {
        let firewall = Arc::new(SdkFirewallProvider::new(base_config.clone()));
        let customer_log = Arc::new(CloudWatchLogSink::new(
            tenant_credentials,
            &config.lambda_region,
            config.log_group_name(),
            version,
        ));
        let default_deny = DefaultDenyRules::bundled()
            .map_err(|e| ReconcileError::BundledData(e.to_string()))?;
        let settings = ReconcilerSettings::new(
            firewall_account,
            config.firewall_vpc_id.clone(),
            config.supported_regions.clone(),
        );

        Ok(Self::new(firewall, customer_log, default_deny, settings))
    }
}
