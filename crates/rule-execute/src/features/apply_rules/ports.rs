// crates/rule-execute/src/features/apply_rules/ports.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

/// IP-set variables of a rule group: set name -> CIDR definitions.
pub type IpSets = BTreeMap<String, Vec<String>>;

/// Typed failures of the firewall control surface. The reconciler's retry
/// behavior branches on these, so the adapter maps service error codes
/// rather than stringifying everything.
#[derive(Debug, thiserror::Error)]
pub enum FirewallApiError {
    /// The update token went stale under us; re-read and retry.
    #[error("stale update token")]
    InvalidToken,
    #[error("api limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("firewall api error: {0}")]
    Other(String),
}

pub type ApiResult<T> = Result<T, FirewallApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Active,
    Deleting,
}

/// One described rule group: the newline-joined rules string, the IP-set
/// variables, and the optimistic-concurrency token guarding the next update.
#[derive(Debug, Clone)]
pub struct RuleGroupState {
    pub arn: String,
    pub name: String,
    pub rules: String,
    pub ip_sets: IpSets,
    pub consumed_capacity: i32,
    pub status: GroupStatus,
    pub update_token: String,
}

/// One described firewall policy, reduced to what the reconciler manages:
/// its ordered rule-group references.
#[derive(Debug, Clone)]
pub struct PolicyState {
    pub arn: String,
    pub references: Vec<String>,
    pub update_token: String,
}

/// Port over the managed stateful firewall's control plane, scoped to one
/// region. List operations paginate to exhaustion.
#[async_trait]
pub trait FirewallApi: Send + Sync {
    async fn list_rule_groups(&self) -> ApiResult<BTreeSet<String>>;

    async fn describe_rule_group(&self, arn: &str) -> ApiResult<RuleGroupState>;

    /// Lightweight existence probe used while waiting out a deletion.
    async fn rule_group_exists(&self, arn: &str) -> ApiResult<bool>;

    /// Returns the ARN of the new group.
    async fn create_rule_group(
        &self,
        name: &str,
        capacity: i32,
        rules: &str,
        ip_sets: &IpSets,
    ) -> ApiResult<String>;

    async fn update_rule_group(
        &self,
        arn: &str,
        update_token: &str,
        rules: &str,
        ip_sets: &IpSets,
    ) -> ApiResult<()>;

    async fn delete_rule_group(&self, name: &str) -> ApiResult<()>;

    async fn list_firewall_policies(&self) -> ApiResult<BTreeSet<String>>;

    async fn describe_firewall_policy(&self, arn: &str) -> ApiResult<PolicyState>;

    /// Creates a policy with the standard stateless defaults and the given
    /// group as its only reference. Returns the policy ARN.
    async fn create_firewall_policy(&self, name: &str, rule_group_arn: &str) -> ApiResult<String>;

    async fn update_firewall_policy(
        &self,
        arn: &str,
        update_token: &str,
        references: &[String],
    ) -> ApiResult<()>;
}

/// Hands out a region-scoped [`FirewallApi`]. Account-delete events sweep
/// every supported region through this.
#[async_trait]
pub trait FirewallProvider: Send + Sync {
    async fn for_region(&self, region: &str) -> Arc<dyn FirewallApi>;
}
