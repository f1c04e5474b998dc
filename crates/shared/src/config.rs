// crates/shared/src/config.rs
//
// Environment-driven configuration shared by both stages. Every variable is
// read once at startup; the stages receive the parsed value and never touch
// the process environment themselves.

use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

/// Toggle value of `RULE_ORDER` that makes the compiler inject
/// `priority:100;` into every customer rule.
pub const DEFAULT_ACTION_ORDER: &str = "DEFAULT_ACTION_ORDER";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Region this worker runs in (`LAMBDA_REGION`).
    pub lambda_region: String,
    /// FIFO queue between the stages (`QUEUE_NAME`).
    pub queue_name: String,
    /// Cross-account role name assumed in the tenant account (`XACCOUNT_ROLE`).
    pub xaccount_role: String,
    /// Deployment name prefix, part of the tenant log group name (`NAME_PREFIX`).
    pub name_prefix: String,
    /// Deployment stage, part of the tenant log group name (`STAGE`).
    pub stage: String,
    /// Regions swept by account-delete events (`SUPPORTED_REGIONS`, comma separated).
    pub supported_regions: Vec<String>,
    /// Rule evaluation order of the firewall policy (`RULE_ORDER`).
    pub rule_order: String,
    /// The firewall's own VPC id, identity of the reserved rules (`VPC_ID`).
    pub firewall_vpc_id: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).unwrap_or_default();
        Self {
            lambda_region: env::var("LAMBDA_REGION").unwrap_or_else(|_| "eu-west-1".to_string()),
            queue_name: env::var("QUEUE_NAME").unwrap_or_else(|_| "RuleCache.fifo".to_string()),
            xaccount_role: var("XACCOUNT_ROLE"),
            name_prefix: var("NAME_PREFIX"),
            stage: var("STAGE"),
            supported_regions: var("SUPPORTED_REGIONS")
                .split(',')
                .map(str::trim)
                .filter(|region| !region.is_empty())
                .map(str::to_string)
                .collect(),
            rule_order: var("RULE_ORDER"),
            firewall_vpc_id: var("VPC_ID").replace("vpc-", ""),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xaccount_role.is_empty() {
            return Err(ConfigError::Missing("XACCOUNT_ROLE"));
        }
        if self.name_prefix.is_empty() {
            return Err(ConfigError::Missing("NAME_PREFIX"));
        }
        if self.stage.is_empty() {
            return Err(ConfigError::Missing("STAGE"));
        }
        Ok(())
    }

    /// The tenant-facing log group this deployment writes to.
    pub fn log_group_name(&self) -> String {
        format!("cw-{}-CustomerLog-{}", self.name_prefix, self.stage)
    }

    /// Whether the firewall policy uses default action order, which requires
    /// customer rules to carry an explicit `priority:100;`.
    pub fn default_action_order(&self) -> bool {
        self.rule_order == DEFAULT_ACTION_ORDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            lambda_region: "eu-west-1".to_string(),
            queue_name: "RuleCache.fifo".to_string(),
            xaccount_role: "rule-reader".to_string(),
            name_prefix: "nfw".to_string(),
            stage: "dev".to_string(),
            supported_regions: vec!["eu-west-1".to_string(), "eu-central-1".to_string()],
            rule_order: String::new(),
            firewall_vpc_id: "0a1b2c3d".to_string(),
        }
    }

    #[test]
    fn log_group_name_is_derived_from_prefix_and_stage() {
        assert_eq!(config().log_group_name(), "cw-nfw-CustomerLog-dev");
    }

    #[test]
    fn default_action_order_requires_the_exact_toggle() {
        let mut cfg = config();
        assert!(!cfg.default_action_order());
        cfg.rule_order = DEFAULT_ACTION_ORDER.to_string();
        assert!(cfg.default_action_order());
    }

    #[test]
    fn validate_flags_missing_required_variables() {
        let mut cfg = config();
        cfg.stage = String::new();
        assert!(matches!(cfg.validate(), Err(ConfigError::Missing("STAGE"))));
    }
}
