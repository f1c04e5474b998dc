// crates/rule-execute/src/features/apply_rules/use_case_test.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use shared::logging::MemorySink;
use shared::models::{CompilationMessage, MessageAttributes};
use shared::RuleEvent;

use crate::domain::DefaultDenyRules;
use crate::features::apply_rules::error::ReconcileError;
use crate::features::apply_rules::mocks::{InMemoryFirewall, StaticFirewallProvider};
use crate::features::apply_rules::ports::IpSets;
use crate::features::apply_rules::registry::{
    ResourceRegistry, CAP_RULE_GROUP, MAX_RULES_PER_POLICY,
};
use crate::features::apply_rules::use_case::{ApplyRulesUseCase, ReconcilerSettings};

const ACCOUNT: &str = "111122223333";
const VPC: &str = "aaa111";

fn fast_settings(regions: Vec<String>) -> ReconcilerSettings {
    let mut settings = ReconcilerSettings::new("999988887777", "0f1e2d3c", regions);
    settings.token_retry_delay = Duration::from_millis(1);
    settings.delete_retry_delay = Duration::from_millis(1);
    settings.delete_poll_interval = Duration::from_millis(1);
    settings.delete_wait = Duration::from_millis(50);
    settings
}

fn use_case(api: Arc<InMemoryFirewall>, sink: Arc<MemorySink>) -> ApplyRulesUseCase {
    ApplyRulesUseCase::new(
        Arc::new(StaticFirewallProvider::new(api)),
        sink,
        DefaultDenyRules::bundled().unwrap(),
        fast_settings(vec!["eu-west-1".to_string()]),
    )
}

fn stamped_rule(account: &str, vpc: &str, tag: &str) -> (String, String) {
    let name = format!("{account}-{vpc}-{tag}");
    let rule = format!(
        "pass tls $a{account}{vpc} any -> $EXTERNAL_NET any (tls.sni; \
         content:\"{tag}.example\"; startswith; endswith; flow:to_server, established; \
         sid:55; rev:1; metadata: rule_name {name};)"
    );
    (name, rule)
}

fn update_message(rules: BTreeMap<String, String>) -> (CompilationMessage, MessageAttributes) {
    let message = CompilationMessage {
        vpc: VPC.to_string(),
        account: ACCOUNT.to_string(),
        region: "eu-west-1".to_string(),
        cidr: "10.0.0.0/24".to_string(),
        rules,
    };
    let attributes = MessageAttributes {
        event: RuleEvent::Update,
        account: ACCOUNT.to_string(),
        region: "eu-west-1".to_string(),
        version: "v-1".to_string(),
        logstream_name: "stream".to_string(),
    };
    (message, attributes)
}

#[tokio::test]
async fn update_without_scope_fields_is_rejected() {
    let api = InMemoryFirewall::new("eu-west-1");
    let sink = Arc::new(MemorySink::new());
    let use_case = use_case(api, sink);

    let (mut message, attributes) = update_message(BTreeMap::new());
    message.cidr = String::new();

    let error = use_case.execute(&message, &attributes).await.unwrap_err();
    assert!(matches!(error, ReconcileError::MalformedMessage(_)));
}

#[tokio::test]
async fn update_with_empty_target_drains_the_scope() {
    let api = InMemoryFirewall::new("eu-west-1");
    let (_, rule) = stamped_rule(ACCOUNT, VPC, "r1");
    let (_, foreign_rule) = stamped_rule("444455556666", "bbb222", "r9");
    let mut ip_sets = IpSets::new();
    ip_sets.insert(format!("a{ACCOUNT}{VPC}"), vec!["10.0.0.0/24".to_string()]);
    ip_sets.insert(
        "a444455556666bbb222".to_string(),
        vec!["10.9.0.0/24".to_string()],
    );
    let arn = api.seed_group("g1", &format!("{rule}\n{foreign_rule}"), ip_sets);
    api.seed_policy("p1", vec![arn]);

    let sink = Arc::new(MemorySink::new());
    let use_case = use_case(api.clone(), sink);

    let (message, attributes) = update_message(BTreeMap::new());
    use_case.execute(&message, &attributes).await.unwrap();

    // Scope isolation: only this VPC's rule is gone.
    let remaining = api.all_rules();
    assert!(remaining.iter().any(|r| r.contains("444455556666-bbb222-r9")));
    assert!(!remaining.iter().any(|r| r.contains(&format!("{ACCOUNT}-{VPC}-r1"))));
}

#[tokio::test]
async fn full_policies_force_a_new_policy() {
    let api = InMemoryFirewall::new("eu-west-1");
    // One policy with every reference slot taken.
    let full: Vec<String> = (0..MAX_RULES_PER_POLICY)
        .map(|i| api.group_arn(&format!("filler-{i}")))
        .collect();
    api.seed_policy("p-full", full);

    let group_arn = api.seed_group("g-new", "", IpSets::new());
    let mut registry = ResourceRegistry::load(api.clone()).await.unwrap();
    registry.associate(&group_arn).await.unwrap();

    let state = api.state.lock().unwrap();
    assert_eq!(state.policies.len(), 2);
    let created = state
        .policies
        .values()
        .find(|policy| policy.name.starts_with("Policy-"))
        .expect("new policy created");
    assert_eq!(created.references, vec![group_arn.clone()]);
}

#[tokio::test]
async fn reserved_group_is_created_once_and_left_alone_when_in_sync() {
    let api = InMemoryFirewall::new("eu-west-1");
    let sink = Arc::new(MemorySink::new());
    let use_case = use_case(api.clone(), sink);

    let (name, rule) = stamped_rule(ACCOUNT, VPC, "r1");
    let (message, attributes) = update_message(BTreeMap::from([(name, rule)]));
    use_case.execute(&message, &attributes).await.unwrap();

    let reserved = api
        .group_names()
        .into_iter()
        .find(|name| name.ends_with("-reserved"))
        .expect("reserved group exists");
    let baseline = api.group_by_name(&reserved).unwrap();
    assert!(baseline.rules.contains("msg: \"Drop all TCP\";"));
    assert!(baseline.rules.contains("priority:255;"));
    assert!(baseline
        .rules
        .contains("metadata: rule_name 999988887777-0f1e2d3c-"));

    // Re-apply: reserved baseline is byte-identical, so no further writes.
    api.clear_calls();
    use_case.execute(&message, &attributes).await.unwrap();
    assert_eq!(api.mutation_calls(), 0);
}

#[tokio::test]
async fn reserved_group_never_receives_customer_rules() {
    let api = InMemoryFirewall::new("eu-west-1");
    // A full customer group and a nearly empty reserved group: a naive
    // smallest-fit would pick the reserved one.
    let (_, filler) = stamped_rule("444455556666", "bbb222", "r9");
    let full_arn = api.seed_group("g-full", &filler, IpSets::new());
    api.state
        .lock()
        .unwrap()
        .groups
        .get_mut(&full_arn)
        .unwrap()
        .consumed_override = Some(CAP_RULE_GROUP);
    api.seed_group("1700000000-reserved", "", IpSets::new());
    api.seed_policy("p1", vec![full_arn]);

    let sink = Arc::new(MemorySink::new());
    let use_case = use_case(api.clone(), sink);

    let (name, rule) = stamped_rule(ACCOUNT, VPC, "r1");
    let (message, attributes) = update_message(BTreeMap::from([(name.clone(), rule)]));
    use_case.execute(&message, &attributes).await.unwrap();

    let reserved = api.group_by_name("1700000000-reserved").unwrap();
    assert!(!reserved.rules.contains(&name));
    // The rule landed in a freshly created group instead.
    assert_eq!(
        api.group_names()
            .iter()
            .filter(|group| !group.ends_with("-reserved"))
            .count(),
        2
    );
}

#[tokio::test]
async fn stuck_deletion_times_out_as_internal() {
    let api = InMemoryFirewall::new("eu-west-1");
    let (_, rule) = stamped_rule(ACCOUNT, VPC, "r1");
    let mut ip_sets = IpSets::new();
    ip_sets.insert(format!("a{ACCOUNT}{VPC}"), vec!["10.0.0.0/24".to_string()]);
    let arn = api.seed_group("g1", &rule, ip_sets);
    api.seed_policy("p1", vec![arn]);
    *api.stuck_delete.lock().unwrap() = true;

    let sink = Arc::new(MemorySink::new());
    let use_case = use_case(api.clone(), sink);

    let (message, attributes) = update_message(BTreeMap::new());
    let error = use_case.execute(&message, &attributes).await.unwrap_err();
    assert!(matches!(error, ReconcileError::DeleteTimeout(_)));
}
