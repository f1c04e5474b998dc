// crates/rule-execute/src/domain/default_deny.rs

use serde::Deserialize;

use shared::digest;
use shared::rule_name::RuleName;

/// The default-deny baseline carried by the reserved rule group, loaded from
/// the bundled `data/defaultdeny.yaml`. The bundled rules are bare protocol
/// drops; stamping happens at apply time so the rule identity is bound to
/// the firewall's own account and VPC.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultDenyRules {
    #[serde(rename = "Rules")]
    rules: Vec<String>,
}

impl DefaultDenyRules {
    pub fn bundled() -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(include_str!("../../data/defaultdeny.yaml"))
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn from_rules(rules: Vec<String>) -> Self {
        Self { rules }
    }

    /// Stamps every baseline rule with its drop message, priority 255 and a
    /// rule name owned by the firewall itself. Output is deterministic, so
    /// re-synthesizing against an unchanged baseline is byte-identical.
    pub fn synthesize(&self, firewall_account: &str, firewall_vpc: &str) -> Vec<String> {
        self.rules
            .iter()
            .map(|base| {
                let proto = base.split_whitespace().nth(1).unwrap_or_default();
                let rule_name = RuleName::derive(firewall_account, firewall_vpc, base);
                let sid = digest::sid(base);
                let stamp = format!(
                    "msg: \"Drop all {}\"; priority:255; flow:to_server, established; \
                     sid:{sid}; rev:1; metadata: rule_name {rule_name};",
                    proto.to_uppercase()
                );
                match base.strip_suffix(')') {
                    // Rules that already carry options get the stamp spliced
                    // inside their options block.
                    Some(open) => format!("{open} {stamp})"),
                    None => format!("{base} ({stamp})"),
                }
            })
            .collect()
    }
}
