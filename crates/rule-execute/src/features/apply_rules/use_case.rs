// crates/rule-execute/src/features/apply_rules/use_case.rs
//
// Differential reconciliation: derive the target rule set for the event's
// scope, converge the live firewall onto it, and keep the reserved
// default-deny group in sync. Every write is diff-based and keyed on
// rule_name, so retries and replays are idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::{sleep, Instant};

use shared::logging::{CustomerLogSink, LogLevel};
use shared::models::{CompilationMessage, MessageAttributes};
use shared::rule_name::RuleName;
use shared::{RuleEvent, Scope};

use crate::domain::DefaultDenyRules;

use super::error::ReconcileError;
use super::ports::{FirewallApi, FirewallApiError, FirewallProvider, IpSets, RuleGroupState};
use super::registry::{
    ResourceRegistry, CAP_RESERVED, CAP_RULE_GROUP, RESERVED_GROUP_SUFFIX,
};

/// Tunables of the reconcile loop. The defaults are the production values;
/// tests shrink the delays.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Regions swept by an account-delete event.
    pub supported_regions: Vec<String>,
    /// Account owning the firewall; identity of the reserved rules.
    pub firewall_account: String,
    /// The firewall's own VPC id (unprefixed); identity of the reserved rules.
    pub firewall_vpc: String,
    /// Upper bound on waiting for a rule-group deletion to finish.
    pub delete_wait: Duration,
    /// Pause before retrying an update that lost its token.
    pub token_retry_delay: Duration,
    /// Pause before retrying a rejected delete.
    pub delete_retry_delay: Duration,
    /// Poll interval while waiting out a deletion.
    pub delete_poll_interval: Duration,
}

impl ReconcilerSettings {
    pub fn new(
        firewall_account: impl Into<String>,
        firewall_vpc: impl Into<String>,
        supported_regions: Vec<String>,
    ) -> Self {
        Self {
            supported_regions,
            firewall_account: firewall_account.into(),
            firewall_vpc: firewall_vpc.into(),
            delete_wait: Duration::from_secs(30),
            token_retry_delay: Duration::from_secs(2),
            delete_retry_delay: Duration::from_secs(10),
            delete_poll_interval: Duration::from_secs(2),
        }
    }
}

pub struct ApplyRulesUseCase {
    firewall: Arc<dyn FirewallProvider>,
    customer_log: Arc<dyn CustomerLogSink>,
    default_deny: DefaultDenyRules,
    settings: ReconcilerSettings,
}

impl ApplyRulesUseCase {
    pub fn new(
        firewall: Arc<dyn FirewallProvider>,
        customer_log: Arc<dyn CustomerLogSink>,
        default_deny: DefaultDenyRules,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            firewall,
            customer_log,
            default_deny,
            settings,
        }
    }

    /// Processes one compilation message. The event kind is explicit on the
    /// attributes; the body fields only carry the scope.
    pub async fn execute(
        &self,
        message: &CompilationMessage,
        attributes: &MessageAttributes,
    ) -> Result<(), ReconcileError> {
        let stream = attributes.logstream_name.as_str();
        let api = self.firewall.for_region(&attributes.region).await;
        let mut registry = ResourceRegistry::load(api).await?;

        match attributes.event {
            RuleEvent::Update => {
                if message.account.is_empty() || message.vpc.is_empty() || message.cidr.is_empty()
                {
                    return Err(ReconcileError::MalformedMessage(
                        "update event without account, vpc or cidr".to_string(),
                    ));
                }
                let note = format!(
                    "Updating rules for account {} and vpc-{}",
                    message.account, message.vpc
                );
                tracing::info!(account = %message.account, vpc = %message.vpc, "updating rules");
                self.customer_log.send(stream, LogLevel::Info, &note).await?;

                let scope = Scope::vpc(&message.account, &message.vpc);
                self.upsert_rules(&mut registry, message).await?;
                self.cleanup_scope(&mut registry, &scope, &message.rules)
                    .await?;
            }
            RuleEvent::DeleteVpc => {
                if message.account.is_empty() || message.vpc.is_empty() {
                    return Err(ReconcileError::MalformedMessage(
                        "vpc delete event without account or vpc".to_string(),
                    ));
                }
                let note = format!(
                    "DeleteVpc - All rules for the vpc-{} will be deleted.",
                    message.vpc
                );
                tracing::info!(vpc = %message.vpc, "deleting all rules of the vpc");
                self.customer_log.send(stream, LogLevel::Info, &note).await?;

                let scope = Scope::vpc(&message.account, &message.vpc);
                self.cleanup_scope(&mut registry, &scope, &BTreeMap::new())
                    .await?;
                self.prune_ip_sets(&mut registry, &scope.ip_set_prefix())
                    .await?;
            }
            RuleEvent::DeleteS3 => {
                if message.account.is_empty() {
                    return Err(ReconcileError::MalformedMessage(
                        "s3 delete event without account".to_string(),
                    ));
                }
                let note = format!(
                    "DeleteS3 - All rules for the Account {} in {} will be deleted.",
                    message.account, attributes.region
                );
                tracing::info!(account = %message.account, "deleting all account rules in region");
                self.customer_log.send(stream, LogLevel::Info, &note).await?;

                let scope = Scope::account(&message.account);
                self.cleanup_scope(&mut registry, &scope, &BTreeMap::new())
                    .await?;
                self.prune_ip_sets(&mut registry, &scope.ip_set_prefix())
                    .await?;
            }
            RuleEvent::DeleteAccount => {
                if message.account.is_empty() {
                    return Err(ReconcileError::MalformedMessage(
                        "account delete event without account".to_string(),
                    ));
                }
                for region in &self.settings.supported_regions {
                    let note = format!(
                        "DeleteAccount - All rules for the Account {} in {} will be deleted",
                        message.account, region
                    );
                    tracing::info!(account = %message.account, region = %region, "regional account sweep");
                    self.customer_log.send(stream, LogLevel::Info, &note).await?;

                    let api = self.firewall.for_region(region).await;
                    match self.delete_account_in_region(api, &message.account).await {
                        Err(ReconcileError::Firewall(FirewallApiError::NotFound(_))) => {
                            tracing::warn!(
                                account = %message.account,
                                region = %region,
                                "no resources in region, skipping"
                            );
                        }
                        other => other?,
                    }
                }
            }
        }

        self.sync_reserved(&mut registry).await?;

        let subject = if message.vpc.is_empty() {
            format!("account {}", message.account)
        } else {
            format!("vpc-{}", message.vpc)
        };
        self.customer_log
            .send(
                stream,
                LogLevel::Info,
                &format!(
                    "Rule change processed for {subject} in region {}",
                    attributes.region
                ),
            )
            .await?;
        Ok(())
    }

    async fn delete_account_in_region(
        &self,
        api: Arc<dyn FirewallApi>,
        account: &str,
    ) -> Result<(), ReconcileError> {
        let mut registry = ResourceRegistry::load(api).await?;
        let scope = Scope::account(account);
        self.cleanup_scope(&mut registry, &scope, &BTreeMap::new())
            .await?;
        self.prune_ip_sets(&mut registry, &scope.ip_set_prefix())
            .await?;
        Ok(())
    }

    /// All live rules in the region, keyed by their stamped identity.
    /// Lines without a stamp are not ours and are left alone.
    async fn scan_live(
        &self,
        registry: &ResourceRegistry,
    ) -> Result<BTreeMap<RuleName, (String, String)>, ReconcileError> {
        let mut live = BTreeMap::new();
        for arn in registry.groups() {
            let group = registry.api().describe_rule_group(arn).await?;
            for line in rule_lines(&group.rules) {
                match RuleName::extract(&line) {
                    Ok(name) => {
                        live.insert(name, (arn.clone(), line));
                    }
                    Err(_) => {
                        tracing::debug!(group = %arn, "line without rule_name stamp ignored");
                    }
                }
            }
        }
        Ok(live)
    }

    /// Inserts every target rule that is not already live. Unchanged rules
    /// are untouched: identical rule_name implies identical bytes.
    async fn upsert_rules(
        &self,
        registry: &mut ResourceRegistry,
        message: &CompilationMessage,
    ) -> Result<(), ReconcileError> {
        let scope = Scope::vpc(&message.account, &message.vpc);
        let ip_set_name = scope.ip_set_prefix();
        let live = self.scan_live(registry).await?;

        for (name_str, rule_string) in &message.rules {
            let name = RuleName::parse(name_str)
                .map_err(|e| ReconcileError::MalformedMessage(e.to_string()))?;
            if live.contains_key(&name) {
                tracing::debug!(rule = %name, "rule exists, no update");
                continue;
            }
            self.place_rule(registry, &name, rule_string, &ip_set_name, &message.cidr)
                .await?;
        }
        Ok(())
    }

    /// Smallest-fit placement; creates and associates a new group when every
    /// existing one is full.
    async fn place_rule(
        &self,
        registry: &mut ResourceRegistry,
        name: &RuleName,
        rule_string: &str,
        ip_set_name: &str,
        cidr: &str,
    ) -> Result<(), ReconcileError> {
        match registry.smallest_fit().await? {
            Some(arn) => {
                let name = name.clone();
                let rule = rule_string.to_string();
                let ip_set = ip_set_name.to_string();
                let cidr = cidr.to_string();
                let api = registry.api().clone();
                let name_for_closure = name.clone();
                self.update_group_with_retry(&api, &arn, move |group| {
                    let mut rules = rule_lines(&group.rules);
                    let already_there = rules.iter().any(|line| {
                        RuleName::extract(line).ok().as_ref() == Some(&name_for_closure)
                    });
                    if !already_there {
                        rules.push(rule.clone());
                    }
                    let mut ip_sets = group.ip_sets.clone();
                    ip_sets.insert(ip_set.clone(), vec![cidr.clone()]);
                    (rules.join("\n"), ip_sets)
                })
                .await?;
                tracing::debug!(rule = %name, group = %arn, "rule placed");
            }
            None => {
                let group_name = generate_group_name();
                tracing::info!(group = %group_name, "no capacity left, creating new rule group");
                let mut ip_sets = IpSets::new();
                ip_sets.insert(ip_set_name.to_string(), vec![cidr.to_string()]);
                let api = registry.api().clone();
                let arn = api
                    .create_rule_group(&group_name, CAP_RULE_GROUP, rule_string, &ip_sets)
                    .await?;
                registry.associate(&arn).await?;
                registry.track_group(arn);
            }
        }
        Ok(())
    }

    /// Deletes every live rule in `scope` that the target set no longer
    /// references. Groups whose rules string empties are deleted outright.
    async fn cleanup_scope(
        &self,
        registry: &mut ResourceRegistry,
        scope: &Scope,
        keep: &BTreeMap<String, String>,
    ) -> Result<(), ReconcileError> {
        let live = self.scan_live(registry).await?;
        let stale: Vec<(RuleName, String)> = live
            .into_iter()
            .filter(|(name, _)| scope.matches(name) && !keep.contains_key(name.as_str()))
            .map(|(name, (arn, _))| (name, arn))
            .collect();

        for (name, group_arn) in stale {
            tracing::debug!(rule = %name, group = %group_arn, "deleting unreferenced rule");
            self.remove_rule_from_group(registry, &group_arn, &name)
                .await?;
        }
        Ok(())
    }

    async fn remove_rule_from_group(
        &self,
        registry: &mut ResourceRegistry,
        group_arn: &str,
        name: &RuleName,
    ) -> Result<(), ReconcileError> {
        // Re-fetch immediately before rewriting; a concurrent worker may
        // have touched the group since the scope scan.
        let api = registry.api().clone();
        let group = api.describe_rule_group(group_arn).await?;
        let remaining: Vec<String> = rule_lines(&group.rules)
            .into_iter()
            .filter(|line| RuleName::extract(line).ok().as_ref() != Some(name))
            .collect();

        if remaining.is_empty() {
            self.delete_group(registry, group_arn, &group.name).await
        } else {
            let name = name.clone();
            self.update_group_with_retry(&api, group_arn, move |group| {
                let remaining: Vec<String> = rule_lines(&group.rules)
                    .into_iter()
                    .filter(|line| RuleName::extract(line).ok().as_ref() != Some(&name))
                    .collect();
                (remaining.join("\n"), group.ip_sets.clone())
            })
            .await
        }
    }

    /// Disassociates and deletes a drained group, then waits out the
    /// deletion so a follow-up message never sees a half-dead group.
    async fn delete_group(
        &self,
        registry: &mut ResourceRegistry,
        group_arn: &str,
        group_name: &str,
    ) -> Result<(), ReconcileError> {
        registry.disassociate(group_arn).await?;

        let api = registry.api().clone();
        match api.delete_rule_group(group_name).await {
            Err(FirewallApiError::InvalidOperation(reason)) => {
                tracing::warn!(group = group_name, %reason, "delete rejected, retrying");
                sleep(self.settings.delete_retry_delay).await;
                api.delete_rule_group(group_name).await?;
            }
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }

        self.wait_until_deleted(&api, group_arn).await?;
        registry.forget_group(group_arn);
        tracing::debug!(group = group_name, "rule group deleted");
        Ok(())
    }

    async fn wait_until_deleted(
        &self,
        api: &Arc<dyn FirewallApi>,
        arn: &str,
    ) -> Result<(), ReconcileError> {
        let deadline = Instant::now() + self.settings.delete_wait;
        loop {
            if !api.rule_group_exists(arn).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ReconcileError::DeleteTimeout(arn.to_string()));
            }
            sleep(self.settings.delete_poll_interval).await;
        }
    }

    /// Removes every IP set owned by the deleted scope from every group.
    async fn prune_ip_sets(
        &self,
        registry: &mut ResourceRegistry,
        prefix: &str,
    ) -> Result<(), ReconcileError> {
        for arn in registry.groups().clone() {
            let api = registry.api().clone();
            let group = api.describe_rule_group(&arn).await?;
            if !group.ip_sets.keys().any(|name| name.starts_with(prefix)) {
                continue;
            }
            let prefix = prefix.to_string();
            self.update_group_with_retry(&api, &arn, move |group| {
                let ip_sets: IpSets = group
                    .ip_sets
                    .iter()
                    .filter(|(name, _)| !name.starts_with(&prefix))
                    .map(|(name, definition)| (name.clone(), definition.clone()))
                    .collect();
                (group.rules.clone(), ip_sets)
            })
            .await?;
        }
        Ok(())
    }

    /// Converges the reserved group onto the synthesized default-deny
    /// baseline, creating it on first contact. A byte-identical baseline is
    /// left untouched.
    async fn sync_reserved(&self, registry: &mut ResourceRegistry) -> Result<(), ReconcileError> {
        let rules_string = self
            .default_deny
            .synthesize(&self.settings.firewall_account, &self.settings.firewall_vpc)
            .join("\n");

        if let Some(arn) = registry.reserved_group().cloned() {
            let api = registry.api().clone();
            let group = api.describe_rule_group(&arn).await?;
            if group.rules == rules_string {
                tracing::debug!("reserved group already in sync");
                return Ok(());
            }
            self.update_group_with_retry(&api, &arn, move |group| {
                (rules_string.clone(), group.ip_sets.clone())
            })
            .await?;
        } else {
            let name = format!("{}{RESERVED_GROUP_SUFFIX}", generate_group_name());
            tracing::info!(group = %name, "creating reserved default-deny group");
            let api = registry.api().clone();
            let arn = api
                .create_rule_group(&name, CAP_RESERVED, &rules_string, &IpSets::new())
                .await?;
            registry.associate(&arn).await?;
            registry.track_group(arn);
        }
        Ok(())
    }

    /// A rule-group update guarded by its token, with one stale-token retry.
    /// The mutation closure re-applies the intended diff against whatever
    /// state the re-read returns, so concurrent changes survive.
    async fn update_group_with_retry<F>(
        &self,
        api: &Arc<dyn FirewallApi>,
        arn: &str,
        mutate: F,
    ) -> Result<(), ReconcileError>
    where
        F: Fn(&RuleGroupState) -> (String, IpSets),
    {
        let group = api.describe_rule_group(arn).await?;
        let (rules, ip_sets) = mutate(&group);
        match api
            .update_rule_group(arn, &group.update_token, &rules, &ip_sets)
            .await
        {
            Err(FirewallApiError::InvalidToken) => {
                tracing::warn!(group = arn, "stale update token, retrying once");
                sleep(self.settings.token_retry_delay).await;
                let fresh = api.describe_rule_group(arn).await?;
                let (rules, ip_sets) = mutate(&fresh);
                api.update_rule_group(arn, &fresh.update_token, &rules, &ip_sets)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
            Ok(()) => Ok(()),
        }
    }
}

/// Lines of a rules string, empty lines dropped.
fn rule_lines(rules: &str) -> Vec<String> {
    rules
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Monotonic group name: seconds since 2006-01-01.
fn generate_group_name() -> String {
    let first_date = Utc
        .with_ymd_and_hms(2006, 1, 1, 0, 0, 0)
        .single()
        .expect("valid epoch");
    (Utc::now() - first_date).num_seconds().to_string()
}
