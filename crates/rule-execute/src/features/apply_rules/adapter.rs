// crates/rule-execute/src/features/apply_rules/adapter.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_networkfirewall::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_networkfirewall::types::{
    FirewallPolicy, IpSet, ResourceManagedStatus, ResourceStatus, RuleGroup, RuleGroupType,
    RuleVariables, RulesSource, StatefulRuleGroupReference,
};
use aws_types::region::Region;

use super::ports::{
    ApiResult, FirewallApi, FirewallApiError, FirewallProvider, GroupStatus, IpSets, PolicyState,
    RuleGroupState,
};

const PAGE_SIZE: i32 = 100;
const GROUP_DESCRIPTION: &str = "Autogenerated - DONT CHANGE";
const STATELESS_DEFAULT_ACTION: &str = "aws:forward_to_sfe";
const STATELESS_FRAGMENT_DEFAULT_ACTION: &str = "aws:pass";

fn classify<E>(err: SdkError<E>) -> FirewallApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.code() {
        Some("InvalidTokenException") => FirewallApiError::InvalidToken,
        Some("LimitExceededException") => {
            FirewallApiError::LimitExceeded(format!("{}", DisplayErrorContext(&err)))
        }
        Some("ResourceNotFoundException") => {
            FirewallApiError::NotFound(format!("{}", DisplayErrorContext(&err)))
        }
        Some("InvalidOperationException") => {
            FirewallApiError::InvalidOperation(format!("{}", DisplayErrorContext(&err)))
        }
        _ => FirewallApiError::Other(format!("{}", DisplayErrorContext(&err))),
    }
}

fn build_rule_group(rules: &str, ip_sets: &IpSets) -> ApiResult<RuleGroup> {
    let mut variables = RuleVariables::builder();
    for (name, definition) in ip_sets {
        let ip_set = IpSet::builder()
            .set_definition(Some(definition.clone()))
            .build()
            .map_err(|e| FirewallApiError::Other(e.to_string()))?;
        variables = variables.ip_sets(name, ip_set);
    }

    Ok(RuleGroup::builder()
        .rule_variables(variables.build())
        .rules_source(RulesSource::builder().rules_string(rules).build())
        .build())
}

/// The production firewall control surface, bound to one region. Retries
/// are handled by the SDK's adaptive policy configured on the shared
/// `SdkConfig` (max 10 attempts).
pub struct NetworkFirewallApi {
    client: aws_sdk_networkfirewall::Client,
}

impl NetworkFirewallApi {
    pub fn new(config: &SdkConfig, region: &str) -> Self {
        let conf = aws_sdk_networkfirewall::config::Builder::from(config)
            .region(Region::new(region.to_string()))
            .build();
        Self {
            client: aws_sdk_networkfirewall::Client::from_conf(conf),
        }
    }
}

#[async_trait]
impl FirewallApi for NetworkFirewallApi {
    async fn list_rule_groups(&self) -> ApiResult<BTreeSet<String>> {
        let mut arns = BTreeSet::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_rule_groups()
                .scope(ResourceManagedStatus::Account)
                .max_results(PAGE_SIZE);
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let page = request.send().await.map_err(classify)?;
            for group in page.rule_groups() {
                if let Some(arn) = group.arn() {
                    arns.insert(arn.to_string());
                }
            }
            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(arns);
            }
        }
    }

    async fn describe_rule_group(&self, arn: &str) -> ApiResult<RuleGroupState> {
        let described = self
            .client
            .describe_rule_group()
            .rule_group_arn(arn)
            .r#type(RuleGroupType::Stateful)
            .send()
            .await
            .map_err(classify)?;

        let update_token = described.update_token().to_string();
        let response = described.rule_group_response();

        let status = match response.rule_group_status() {
            Some(ResourceStatus::Deleting) => GroupStatus::Deleting,
            _ => GroupStatus::Active,
        };

        let rules = described
            .rule_group()
            .and_then(|group| group.rules_source())
            .and_then(|source| source.rules_string())
            .unwrap_or_default()
            .to_string();

        let mut ip_sets = IpSets::new();
        if let Some(variables) = described.rule_group().and_then(|group| group.rule_variables()) {
            if let Some(sets) = variables.ip_sets() {
                for (name, set) in sets {
                    ip_sets.insert(name.clone(), set.definition().to_vec());
                }
            }
        }

        Ok(RuleGroupState {
            arn: response.rule_group_arn().to_string(),
            name: response.rule_group_name().to_string(),
            rules,
            ip_sets,
            consumed_capacity: response.consumed_capacity().unwrap_or_default(),
            status,
            update_token,
        })
    }

    async fn rule_group_exists(&self, arn: &str) -> ApiResult<bool> {
        match self
            .client
            .describe_rule_group_metadata()
            .rule_group_arn(arn)
            .r#type(RuleGroupType::Stateful)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => match classify(err) {
                FirewallApiError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_rule_group(
        &self,
        name: &str,
        capacity: i32,
        rules: &str,
        ip_sets: &IpSets,
    ) -> ApiResult<String> {
        let created = self
            .client
            .create_rule_group()
            .rule_group_name(name)
            .r#type(RuleGroupType::Stateful)
            .description(GROUP_DESCRIPTION)
            .capacity(capacity)
            .rule_group(build_rule_group(rules, ip_sets)?)
            .send()
            .await
            .map_err(classify)?;

        Ok(created.rule_group_response().rule_group_arn().to_string())
    }

    async fn update_rule_group(
        &self,
        arn: &str,
        update_token: &str,
        rules: &str,
        ip_sets: &IpSets,
    ) -> ApiResult<()> {
        self.client
            .update_rule_group()
            .update_token(update_token)
            .rule_group_arn(arn)
            .r#type(RuleGroupType::Stateful)
            .rule_group(build_rule_group(rules, ip_sets)?)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_rule_group(&self, name: &str) -> ApiResult<()> {
        self.client
            .delete_rule_group()
            .rule_group_name(name)
            .r#type(RuleGroupType::Stateful)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_firewall_policies(&self) -> ApiResult<BTreeSet<String>> {
        let mut arns = BTreeSet::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self.client.list_firewall_policies().max_results(PAGE_SIZE);
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let page = request.send().await.map_err(classify)?;
            for policy in page.firewall_policies() {
                if let Some(arn) = policy.arn() {
                    arns.insert(arn.to_string());
                }
            }
            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(arns);
            }
        }
    }

    async fn describe_firewall_policy(&self, arn: &str) -> ApiResult<PolicyState> {
        let described = self
            .client
            .describe_firewall_policy()
            .firewall_policy_arn(arn)
            .send()
            .await
            .map_err(classify)?;

        let references = described
            .firewall_policy()
            .map(|policy| {
                policy
                    .stateful_rule_group_references()
                    .iter()
                    .map(|reference| reference.resource_arn().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(PolicyState {
            arn: arn.to_string(),
            references,
            update_token: described.update_token().to_string(),
        })
    }

    async fn create_firewall_policy(&self, name: &str, rule_group_arn: &str) -> ApiResult<String> {
        let reference = StatefulRuleGroupReference::builder()
            .resource_arn(rule_group_arn)
            .build()
            .map_err(|e| FirewallApiError::Other(e.to_string()))?;
        let policy = FirewallPolicy::builder()
            .stateless_default_actions(STATELESS_DEFAULT_ACTION)
            .stateless_fragment_default_actions(STATELESS_FRAGMENT_DEFAULT_ACTION)
            .stateful_rule_group_references(reference)
            .build()
            .map_err(|e| FirewallApiError::Other(e.to_string()))?;

        let created = self
            .client
            .create_firewall_policy()
            .firewall_policy_name(name)
            .firewall_policy(policy)
            .send()
            .await
            .map_err(classify)?;

        Ok(created
            .firewall_policy_response()
            .firewall_policy_arn()
            .to_string())
    }

    async fn update_firewall_policy(
        &self,
        arn: &str,
        update_token: &str,
        references: &[String],
    ) -> ApiResult<()> {
        // The port only carries the reference list, so the rest of the
        // policy document is re-read here. The caller's token still guards
        // the update.
        let described = self
            .client
            .describe_firewall_policy()
            .firewall_policy_arn(arn)
            .send()
            .await
            .map_err(classify)?;
        let current = described.firewall_policy().ok_or_else(|| {
            FirewallApiError::Other(format!("describe of {arn} returned no policy document"))
        })?;

        let mut builder = FirewallPolicy::builder()
            .set_stateless_default_actions(Some(current.stateless_default_actions().to_vec()))
            .set_stateless_fragment_default_actions(Some(
                current.stateless_fragment_default_actions().to_vec(),
            ))
            .set_stateful_engine_options(current.stateful_engine_options().cloned());
        if !current.stateless_custom_actions().is_empty() {
            builder = builder
                .set_stateless_custom_actions(Some(current.stateless_custom_actions().to_vec()));
        }
        if !current.stateful_default_actions().is_empty() {
            builder = builder
                .set_stateful_default_actions(Some(current.stateful_default_actions().to_vec()));
        }

        for reference in references {
            let reference = StatefulRuleGroupReference::builder()
                .resource_arn(reference)
                .build()
                .map_err(|e| FirewallApiError::Other(e.to_string()))?;
            builder = builder.stateful_rule_group_references(reference);
        }

        self.client
            .update_firewall_policy()
            .update_token(update_token)
            .firewall_policy_arn(arn)
            .firewall_policy(
                builder
                    .build()
                    .map_err(|e| FirewallApiError::Other(e.to_string()))?,
            )
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Hands out region-bound API clients built from the one shared SDK config.
pub struct SdkFirewallProvider {
    base: SdkConfig,
}

impl SdkFirewallProvider {
    pub fn new(base: SdkConfig) -> Self {
        Self { base }
    }
}

#[async_trait]
impl FirewallProvider for SdkFirewallProvider {
    async fn for_region(&self, region: &str) -> Arc<dyn FirewallApi> {
        Arc::new(NetworkFirewallApi::new(&self.base, region))
    }
}
