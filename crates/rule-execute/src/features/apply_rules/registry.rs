// crates/rule-execute/src/features/apply_rules/registry.rs
//
// Invocation-scoped read-through cache of the live rule-group and policy
// ARNs in one region, plus the placement helpers built on it.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;

use super::ports::{ApiResult, FirewallApi, FirewallApiError, GroupStatus, PolicyState};

/// Capacity of a customer rule group.
pub const CAP_RULE_GROUP: i32 = 2000;
/// Capacity of the reserved default-deny group.
pub const CAP_RESERVED: i32 = 100;
/// Rule-group references one policy may hold (vendor soft limit is 20).
pub const MAX_RULES_PER_POLICY: usize = 19;
/// Name prefix of lazily created policies.
pub const POLICY_NAME_PREFIX: &str = "Policy-";
/// Suffix marking the default-deny group; excluded from placement.
pub const RESERVED_GROUP_SUFFIX: &str = "-reserved";

pub struct ResourceRegistry {
    api: Arc<dyn FirewallApi>,
    groups: BTreeSet<String>,
    policies: BTreeSet<String>,
}

impl ResourceRegistry {
    /// Lists every rule group and policy in the region once; describes
    /// happen lazily per operation.
    pub async fn load(api: Arc<dyn FirewallApi>) -> ApiResult<Self> {
        let groups = api.list_rule_groups().await?;
        let policies = api.list_firewall_policies().await?;
        Ok(Self {
            api,
            groups,
            policies,
        })
    }

    pub fn api(&self) -> &Arc<dyn FirewallApi> {
        &self.api
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn policies(&self) -> &BTreeSet<String> {
        &self.policies
    }

    pub fn track_group(&mut self, arn: String) {
        self.groups.insert(arn);
    }

    pub fn forget_group(&mut self, arn: &str) {
        self.groups.remove(arn);
    }

    /// Resource name of an ARN: everything after the first `/`.
    pub fn arn_to_name(arn: &str) -> &str {
        arn.split_once('/').map(|(_, name)| name).unwrap_or(arn)
    }

    /// The region's reserved default-deny group, if one exists.
    pub fn reserved_group(&self) -> Option<&String> {
        self.groups
            .iter()
            .find(|arn| Self::arn_to_name(arn).ends_with(RESERVED_GROUP_SUFFIX))
    }

    /// Greedy smallest-fit placement: the non-reserved, non-deleting group
    /// with the lowest consumed capacity strictly below the group capacity.
    /// `None` means every group is full and a new one must be created.
    pub async fn smallest_fit(&self) -> ApiResult<Option<String>> {
        let mut lowest = CAP_RULE_GROUP;
        let mut chosen: Option<String> = None;

        for arn in &self.groups {
            if Self::arn_to_name(arn).ends_with(RESERVED_GROUP_SUFFIX) {
                continue;
            }
            let group = self.api.describe_rule_group(arn).await?;
            if group.status == GroupStatus::Deleting {
                continue;
            }
            if group.consumed_capacity < lowest {
                lowest = group.consumed_capacity;
                chosen = Some(arn.clone());
            }
        }
        Ok(chosen)
    }

    /// Appends the group to the first policy with a free reference slot,
    /// creating a new policy when every one is full.
    pub async fn associate(&mut self, group_arn: &str) -> ApiResult<()> {
        for policy_arn in self.policies.clone() {
            let policy = self.api.describe_firewall_policy(&policy_arn).await?;
            if policy.references.len() < MAX_RULES_PER_POLICY {
                self.update_policy_with_retry(&policy_arn, policy, |mut references| {
                    if !references.iter().any(|r| r == group_arn) {
                        references.push(group_arn.to_string());
                    }
                    references
                })
                .await?;
                tracing::debug!(group = group_arn, policy = %policy_arn, "associated rule group");
                return Ok(());
            }
        }

        let name = format!(
            "{POLICY_NAME_PREFIX}{}",
            rand::thread_rng().gen_range(1000..1_000_000)
        );
        tracing::info!(policy = %name, "every policy is full, creating a new one");
        let arn = self.api.create_firewall_policy(&name, group_arn).await?;
        self.policies.insert(arn);
        Ok(())
    }

    /// Removes every reference to the group from every policy.
    pub async fn disassociate(&mut self, group_arn: &str) -> ApiResult<()> {
        for policy_arn in self.policies.clone() {
            let policy = self.api.describe_firewall_policy(&policy_arn).await?;
            if !policy.references.iter().any(|r| r == group_arn) {
                continue;
            }
            self.update_policy_with_retry(&policy_arn, policy, |references| {
                references.into_iter().filter(|r| r != group_arn).collect()
            })
            .await?;
            tracing::debug!(group = group_arn, policy = %policy_arn, "disassociated rule group");
        }
        Ok(())
    }

    /// A policy update with one stale-token retry. The retry re-describes
    /// and re-applies the reference diff against the fresh state, so a
    /// concurrent change and our own survive each other.
    async fn update_policy_with_retry<F>(
        &self,
        policy_arn: &str,
        described: PolicyState,
        mutate: F,
    ) -> ApiResult<()>
    where
        F: Fn(Vec<String>) -> Vec<String>,
    {
        let references = mutate(described.references);
        match self
            .api
            .update_firewall_policy(policy_arn, &described.update_token, &references)
            .await
        {
            Err(FirewallApiError::InvalidToken) => {
                tracing::warn!(policy = policy_arn, "stale policy token, retrying once");
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                let fresh = self.api.describe_firewall_policy(policy_arn).await?;
                let references = mutate(fresh.references);
                self.api
                    .update_firewall_policy(policy_arn, &fresh.update_token, &references)
                    .await
            }
            other => other,
        }
    }
}
