// crates/rule-execute/src/features/apply_rules/mocks.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::ports::{
    ApiResult, FirewallApi, FirewallApiError, FirewallProvider, GroupStatus, IpSets, PolicyState,
    RuleGroupState,
};

#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub name: String,
    pub capacity: i32,
    pub rules: String,
    pub ip_sets: IpSets,
    pub token: u64,
    pub deleting: bool,
    /// Overrides the line-count-based consumed capacity, for capacity tests.
    pub consumed_override: Option<i32>,
}

impl GroupRecord {
    pub fn consumed(&self) -> i32 {
        self.consumed_override.unwrap_or_else(|| {
            self.rules
                .split('\n')
                .filter(|line| !line.trim().is_empty())
                .count() as i32
        })
    }

    pub fn rule_lines(&self) -> Vec<String> {
        self.rules
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRecord {
    pub name: String,
    pub references: Vec<String>,
    pub token: u64,
}

#[derive(Debug, Default)]
pub struct FirewallState {
    pub groups: BTreeMap<String, GroupRecord>,
    pub policies: BTreeMap<String, PolicyRecord>,
}

/// In-memory firewall fake with real update-token semantics: every mutation
/// bumps the token, every tokened call is checked, and a scripted
/// `fail_next_update` lets tests force one conflict.
pub struct InMemoryFirewall {
    pub region: String,
    pub account: String,
    pub state: Arc<Mutex<FirewallState>>,
    /// Names of every API call made, in order.
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_next_update: Arc<Mutex<Option<FirewallApiError>>>,
    /// When set, every call fails with NotFound (regional sweep tests).
    pub not_found: Arc<Mutex<bool>>,
    /// When set, deletes are accepted but the group never disappears.
    pub stuck_delete: Arc<Mutex<bool>>,
}

impl InMemoryFirewall {
    pub fn new(region: &str) -> Arc<Self> {
        Arc::new(Self {
            region: region.to_string(),
            account: "999988887777".to_string(),
            state: Arc::new(Mutex::new(FirewallState::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_next_update: Arc::new(Mutex::new(None)),
            not_found: Arc::new(Mutex::new(false)),
            stuck_delete: Arc::new(Mutex::new(false)),
        })
    }

    pub fn group_arn(&self, name: &str) -> String {
        format!(
            "arn:aws:network-firewall:{}:{}:stateful-rulegroup/{name}",
            self.region, self.account
        )
    }

    pub fn policy_arn(&self, name: &str) -> String {
        format!(
            "arn:aws:network-firewall:{}:{}:firewall-policy/{name}",
            self.region, self.account
        )
    }

    /// Seeds a group directly into the live state, bypassing the API.
    pub fn seed_group(&self, name: &str, rules: &str, ip_sets: IpSets) -> String {
        let arn = self.group_arn(name);
        self.state.lock().unwrap().groups.insert(
            arn.clone(),
            GroupRecord {
                name: name.to_string(),
                capacity: super::registry::CAP_RULE_GROUP,
                rules: rules.to_string(),
                ip_sets,
                token: 1,
                deleting: false,
                consumed_override: None,
            },
        );
        arn
    }

    pub fn seed_policy(&self, name: &str, references: Vec<String>) -> String {
        let arn = self.policy_arn(name);
        self.state.lock().unwrap().policies.insert(
            arn.clone(),
            PolicyRecord {
                name: name.to_string(),
                references,
                token: 1,
            },
        );
        arn
    }

    pub fn group_by_name(&self, name: &str) -> Option<GroupRecord> {
        self.state
            .lock()
            .unwrap()
            .groups
            .values()
            .find(|group| group.name == name)
            .cloned()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .groups
            .values()
            .map(|group| group.name.clone())
            .collect()
    }

    /// Every rule line across every group.
    pub fn all_rules(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .groups
            .values()
            .flat_map(GroupRecord::rule_lines)
            .collect()
    }

    pub fn all_ip_set_names(&self) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .groups
            .values()
            .flat_map(|group| group.ip_sets.keys().cloned())
            .collect()
    }

    /// Count of state-changing API calls (create/update/delete).
    pub fn mutation_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| {
                call.starts_with("create_") || call.starts_with("update_") || call.starts_with("delete_")
            })
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: &str) -> ApiResult<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if *self.not_found.lock().unwrap() {
            return Err(FirewallApiError::NotFound(format!(
                "no resources in {}",
                self.region
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FirewallApi for InMemoryFirewall {
    async fn list_rule_groups(&self) -> ApiResult<BTreeSet<String>> {
        self.record("list_rule_groups")?;
        Ok(self.state.lock().unwrap().groups.keys().cloned().collect())
    }

    async fn describe_rule_group(&self, arn: &str) -> ApiResult<RuleGroupState> {
        self.record("describe_rule_group")?;
        let state = self.state.lock().unwrap();
        let group = state
            .groups
            .get(arn)
            .ok_or_else(|| FirewallApiError::NotFound(arn.to_string()))?;
        Ok(RuleGroupState {
            arn: arn.to_string(),
            name: group.name.clone(),
            rules: group.rules.clone(),
            ip_sets: group.ip_sets.clone(),
            consumed_capacity: group.consumed(),
            status: if group.deleting {
                GroupStatus::Deleting
            } else {
                GroupStatus::Active
            },
            update_token: group.token.to_string(),
        })
    }

    async fn rule_group_exists(&self, arn: &str) -> ApiResult<bool> {
        self.record("describe_rule_group_metadata")?;
        Ok(self.state.lock().unwrap().groups.contains_key(arn))
    }

    async fn create_rule_group(
        &self,
        name: &str,
        capacity: i32,
        rules: &str,
        ip_sets: &IpSets,
    ) -> ApiResult<String> {
        self.record("create_rule_group")?;
        let arn = self.group_arn(name);
        let mut state = self.state.lock().unwrap();
        if state.groups.contains_key(&arn) {
            return Err(FirewallApiError::Other(format!(
                "group {name} already exists"
            )));
        }
        state.groups.insert(
            arn.clone(),
            GroupRecord {
                name: name.to_string(),
                capacity,
                rules: rules.to_string(),
                ip_sets: ip_sets.clone(),
                token: 1,
                deleting: false,
                consumed_override: None,
            },
        );
        Ok(arn)
    }

    async fn update_rule_group(
        &self,
        arn: &str,
        update_token: &str,
        rules: &str,
        ip_sets: &IpSets,
    ) -> ApiResult<()> {
        self.record("update_rule_group")?;
        if let Some(err) = self.fail_next_update.lock().unwrap().take() {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .get_mut(arn)
            .ok_or_else(|| FirewallApiError::NotFound(arn.to_string()))?;
        if group.token.to_string() != update_token {
            return Err(FirewallApiError::InvalidToken);
        }
        group.rules = rules.to_string();
        group.ip_sets = ip_sets.clone();
        group.token += 1;
        Ok(())
    }

    async fn delete_rule_group(&self, name: &str) -> ApiResult<()> {
        self.record("delete_rule_group")?;
        let mut state = self.state.lock().unwrap();
        let arn = state
            .groups
            .iter()
            .find(|(_, group)| group.name == name)
            .map(|(arn, _)| arn.clone())
            .ok_or_else(|| FirewallApiError::NotFound(name.to_string()))?;
        if *self.stuck_delete.lock().unwrap() {
            state.groups.get_mut(&arn).expect("group present").deleting = true;
        } else {
            state.groups.remove(&arn);
        }
        Ok(())
    }

    async fn list_firewall_policies(&self) -> ApiResult<BTreeSet<String>> {
        self.record("list_firewall_policies")?;
        Ok(self.state.lock().unwrap().policies.keys().cloned().collect())
    }

    async fn describe_firewall_policy(&self, arn: &str) -> ApiResult<PolicyState> {
        self.record("describe_firewall_policy")?;
        let state = self.state.lock().unwrap();
        let policy = state
            .policies
            .get(arn)
            .ok_or_else(|| FirewallApiError::NotFound(arn.to_string()))?;
        Ok(PolicyState {
            arn: arn.to_string(),
            references: policy.references.clone(),
            update_token: policy.token.to_string(),
        })
    }

    async fn create_firewall_policy(&self, name: &str, rule_group_arn: &str) -> ApiResult<String> {
        self.record("create_firewall_policy")?;
        let arn = self.policy_arn(name);
        self.state.lock().unwrap().policies.insert(
            arn.clone(),
            PolicyRecord {
                name: name.to_string(),
                references: vec![rule_group_arn.to_string()],
                token: 1,
            },
        );
        Ok(arn)
    }

    async fn update_firewall_policy(
        &self,
        arn: &str,
        update_token: &str,
        references: &[String],
    ) -> ApiResult<()> {
        self.record("update_firewall_policy")?;
        let mut state = self.state.lock().unwrap();
        let policy = state
            .policies
            .get_mut(arn)
            .ok_or_else(|| FirewallApiError::NotFound(arn.to_string()))?;
        if policy.token.to_string() != update_token {
            return Err(FirewallApiError::InvalidToken);
        }
        policy.references = references.to_vec();
        policy.token += 1;
        Ok(())
    }
}

/// Provider mapping regions to in-memory firewalls; unknown regions get the
/// fallback instance.
pub struct StaticFirewallProvider {
    fallback: Arc<InMemoryFirewall>,
    regions: Mutex<BTreeMap<String, Arc<InMemoryFirewall>>>,
}

impl StaticFirewallProvider {
    pub fn new(fallback: Arc<InMemoryFirewall>) -> Self {
        Self {
            fallback,
            regions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, region: &str, api: Arc<InMemoryFirewall>) {
        self.regions
            .lock()
            .unwrap()
            .insert(region.to_string(), api);
    }
}

#[async_trait]
impl FirewallProvider for StaticFirewallProvider {
    async fn for_region(&self, region: &str) -> Arc<dyn FirewallApi> {
        let api = self
            .regions
            .lock()
            .unwrap()
            .get(region)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        api
    }
}
