// crates/rule-collect/src/domain/synthesizer.rs
//
// Turns declarative rule specs into fully qualified, meta-stamped Suricata
// rules. Every rule leaves here carrying its content-addressed rule_name and
// a sid derived from the same digest, so compiling identical intent twice
// yields byte-identical rules.

use std::collections::BTreeMap;

use regex::Regex;
use shared::digest;
use shared::models::CompilationMessage;
use shared::rule_name::RuleName;

use crate::domain::protocols::ProtocolTable;

/// Priority stamped into customer rules when the policy runs in default
/// action order.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Meta keywords the compiler owns. A custom rule carrying any of these
/// would collide with the stamps added here.
pub const RESERVED_META_KEYWORDS: [&str; 9] = [
    "msg",
    "sid",
    "rev",
    "gid",
    "classtype",
    "reference",
    "priority",
    "metadata",
    "target",
];

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid base format for rule: {0}")]
    InvalidBaseFormat(String),
    #[error("content keyword missing in: {0}")]
    MissingContent(String),
    #[error("domain contains only a top-level domain: {0}")]
    LoneTld(String),
    #[error("invalid IP-set variable name in rule: {0}")]
    IpSetVariableMismatch(String),
    #[error("reserved keywords found in rule: {0}")]
    ReservedKeyword(String),
    #[error("missing rule options in: {0}")]
    MissingRuleOptions(String),
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

/// The compiled rules of one VPC, accumulated spec by spec and finally
/// turned into a compilation message.
#[derive(Debug, Clone)]
pub struct RuleSet {
    account: String,
    vpc: String,
    region: String,
    version: String,
    cidr: String,
    rules: BTreeMap<String, String>,
}

impl RuleSet {
    pub fn new(
        vpc_id: &str,
        account: impl Into<String>,
        region: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            vpc: vpc_id.replace("vpc-", ""),
            region: region.into(),
            version: version.into(),
            cidr: String::new(),
            rules: BTreeMap::new(),
        }
    }

    pub fn set_cidr(&mut self, cidr: impl Into<String>) {
        self.cidr = cidr.into();
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// VPC id without the `vpc-` prefix.
    pub fn vpc(&self) -> &str {
        &self.vpc
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &BTreeMap<String, String> {
        &self.rules
    }

    /// The IP-set variable every rule of this VPC must reference in its
    /// source slot.
    pub fn ip_set_variable(&self) -> String {
        format!("$a{}{}", self.account, self.vpc)
    }

    pub fn into_message(self) -> CompilationMessage {
        CompilationMessage {
            vpc: self.vpc,
            account: self.account,
            region: self.region,
            cidr: self.cidr,
            rules: self.rules,
        }
    }
}

/// Stateless rule compiler. Holds the protocol table and the validation
/// regexes, compiled once per invocation.
pub struct RuleSynthesizer {
    protocols: ProtocolTable,
    priority_clause: &'static str,
    base_format: Regex,
    content_field: Regex,
    options_block: Regex,
    port_suffix: Regex,
    lone_tld: Regex,
}

impl RuleSynthesizer {
    pub fn new(protocols: ProtocolTable, inject_priority: bool) -> Self {
        let allowed = protocols
            .allowed_protocols()
            .iter()
            .map(|proto| regex::escape(proto))
            .collect::<Vec<_>>()
            .join("|");
        let base_format = Regex::new(&format!(
            r"(?i)^pass\s+({allowed})\s+\$a(\w*)\s+(any|\d{{1,5}})\s+(->|<>)\s+\$EXTERNAL_NET\s+(any|\d{{1,5}})\s+\(.*\)$"
        ))
        .expect("valid regex");

        Self {
            protocols,
            priority_clause: if inject_priority { "priority:100;" } else { "" },
            base_format,
            content_field: Regex::new(r"content:(.*?);").expect("valid regex"),
            options_block: Regex::new(r"\((.*)\)$").expect("valid regex"),
            port_suffix: Regex::new(r"^.+:\d+$").expect("valid regex"),
            lone_tld: Regex::new(r"^\.[a-zA-Z]{2,}$").expect("valid regex"),
        }
    }

    /// Compiles one rule spec into `set`. Predefined keys take the domain
    /// path; everything else is treated as a full Suricata rule.
    pub fn add_rule(&self, set: &mut RuleSet, rule_key: &str, spec: &str) -> Result<(), SynthesisError> {
        if self.protocols.is_predefined(rule_key) {
            let normalized = spec.to_lowercase().replace(' ', "");
            self.add_predefined(set, rule_key, &normalized)
        } else {
            self.add_custom(set, spec)
        }
    }

    fn add_predefined(
        &self,
        set: &mut RuleSet,
        rule_key: &str,
        spec: &str,
    ) -> Result<(), SynthesisError> {
        let keyword = self
            .protocols
            .suricata_keyword(rule_key)
            .ok_or_else(|| SynthesisError::UnsupportedProtocol(rule_key.to_string()))?;
        let proto = keyword.split('.').next().unwrap_or(keyword);

        // Identity is derived from the full normalized spec (port included)
        // plus the protocol key, before anything is split off.
        let digest_input = format!("{spec}{rule_key}");
        let rule_name = RuleName::derive(set.account(), set.vpc(), &digest_input);
        let sid = digest::sid(&digest_input);

        let (domain, port) = if self.port_suffix.is_match(spec) {
            let (domain, port) = spec.rsplit_once(':').expect("port suffix matched");
            (domain, port)
        } else {
            (spec, "any")
        };

        if self.lone_tld.is_match(domain) {
            return Err(SynthesisError::LoneTld(domain.to_string()));
        }

        let ip_set = set.ip_set_variable();
        let priority = self.priority_clause;
        let matcher = if domain.starts_with('.') {
            format!("{keyword}; dotprefix; content:\"{domain}\"; endswith;")
        } else {
            format!("{keyword}; content:\"{domain}\"; startswith; endswith;")
        };
        let rule = format!(
            "pass {proto} {ip_set} any -> $EXTERNAL_NET {port} \
             ({matcher} {priority}flow:to_server, established; sid:{sid}; rev:1; \
             metadata: rule_name {rule_name};)"
        );

        set.rules.insert(rule_name.to_string(), rule);
        Ok(())
    }

    fn add_custom(&self, set: &mut RuleSet, rule: &str) -> Result<(), SynthesisError> {
        let options = self
            .options_block
            .captures(rule)
            .ok_or_else(|| SynthesisError::MissingRuleOptions(rule.to_string()))?;
        let options_full = options.get(0).expect("whole match").as_str();
        let options_inner = options.get(1).expect("options group").as_str();

        self.validate_custom(set, rule, options_full)?;

        // Identity covers the entire tenant-supplied rule text.
        let rule_name = RuleName::derive(set.account(), set.vpc(), rule);
        let sid = digest::sid(rule);
        let priority = self.priority_clause;

        let stamped_options = format!(
            "({options_inner}{priority}sid:{sid};rev:1;metadata: rule_name {rule_name};)"
        );
        let options_start = options.get(0).expect("whole match").start();
        let stamped = format!("{}{stamped_options}", &rule[..options_start]);

        set.rules.insert(rule_name.to_string(), stamped);
        Ok(())
    }

    fn validate_custom(
        &self,
        set: &RuleSet,
        rule: &str,
        options_full: &str,
    ) -> Result<(), SynthesisError> {
        if !self.base_format.is_match(rule) {
            return Err(SynthesisError::InvalidBaseFormat(rule.to_string()));
        }

        let stripped = options_full.replace(' ', "");
        let protocol_key = stripped
            .trim_start_matches('(')
            .split(';')
            .next()
            .unwrap_or_default()
            .trim_end_matches(')');

        let content = self
            .content_field
            .captures(&stripped)
            .ok_or_else(|| SynthesisError::MissingContent(options_full.to_string()))?;

        if protocol_key == "tls.sni" || protocol_key == "http.host" {
            let domain = content[1].trim_matches(|c| c == '\'' || c == '"');
            if self.lone_tld.is_match(domain) {
                return Err(SynthesisError::LoneTld(options_full.to_string()));
            }
        }

        let expected = set.ip_set_variable();
        if rule.split_whitespace().nth(2) != Some(expected.as_str()) {
            return Err(SynthesisError::IpSetVariableMismatch(rule.to_string()));
        }

        for keyword in RESERVED_META_KEYWORDS {
            if stripped.contains(&format!("{keyword}:")) {
                return Err(SynthesisError::ReservedKeyword(rule.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer(inject_priority: bool) -> RuleSynthesizer {
        RuleSynthesizer::new(ProtocolTable::bundled().unwrap(), inject_priority)
    }

    fn set() -> RuleSet {
        RuleSet::new("vpc-abcdef123", "123456789012", "eu-west-1", "v1")
    }

    #[test]
    fn predefined_rule_without_port_uses_any_and_startswith() {
        let synth = synthesizer(false);
        let mut set = set();
        synth.add_rule(&mut set, "https", "example.com").unwrap();

        let (name, rule) = set.rules().iter().next().unwrap();
        assert!(name.starts_with("123456789012-abcdef123-"));
        assert!(rule.starts_with(
            "pass tls $a123456789012abcdef123 any -> $EXTERNAL_NET any \
             (tls.sni; content:\"example.com\"; startswith; endswith; "
        ));
        assert!(rule.contains("flow:to_server, established;"));
        assert!(rule.ends_with(&format!("metadata: rule_name {name};)")));
        assert!(!rule.contains("priority:"));
    }

    #[test]
    fn leading_dot_switches_to_dotprefix() {
        let synth = synthesizer(false);
        let mut set = set();
        synth
            .add_rule(&mut set, "https", ".amazonaws.com:443")
            .unwrap();

        let rule = set.rules().values().next().unwrap();
        assert!(rule.contains("-> $EXTERNAL_NET 443 "));
        assert!(rule.contains("tls.sni; dotprefix; content:\".amazonaws.com\"; endswith;"));
        assert!(!rule.contains("startswith"));
    }

    #[test]
    fn default_action_order_injects_priority_100() {
        let synth = synthesizer(true);
        let mut set = set();
        synth.add_rule(&mut set, "http", "example.com").unwrap();

        let rule = set.rules().values().next().unwrap();
        assert!(rule.contains("priority:100;flow:to_server, established;"));
        assert!(rule.contains("http.host;"));
        assert!(rule.starts_with("pass http "));
    }

    #[test]
    fn predefined_spec_is_normalized_before_compiling() {
        let synth = synthesizer(false);
        let mut upper = set();
        let mut lower = set();
        synth.add_rule(&mut upper, "https", " Example.COM ").unwrap();
        synth.add_rule(&mut lower, "https", "example.com").unwrap();
        assert_eq!(upper.rules(), lower.rules());
    }

    #[test]
    fn identical_intent_compiles_to_identical_bytes() {
        let synth = synthesizer(false);
        let mut first = set();
        let mut second = set();
        synth.add_rule(&mut first, "https", "example.com:8443").unwrap();
        synth.add_rule(&mut second, "https", "example.com:8443").unwrap();
        assert_eq!(first.rules(), second.rules());
    }

    #[test]
    fn lone_tld_is_rejected() {
        let synth = synthesizer(false);
        let mut set = set();
        assert!(matches!(
            synth.add_rule(&mut set, "https", ".com"),
            Err(SynthesisError::LoneTld(_))
        ));
        assert!(set.rules().is_empty());
    }

    #[test]
    fn custom_rule_is_stamped_inside_the_options() {
        let synth = synthesizer(false);
        let mut set = set();
        let rule = "pass tls $a123456789012abcdef123 any -> $EXTERNAL_NET any \
                    (tls.sni; content:\"www.example.com\"; startswith; endswith; \
                    flow:to_server, established;)";
        synth.add_rule(&mut set, "custom", rule).unwrap();

        let (name, stamped) = set.rules().iter().next().unwrap();
        let expected_sid = shared::digest::sid(rule);
        assert!(stamped.contains(&format!("sid:{expected_sid};rev:1;")));
        assert!(stamped.ends_with(&format!("metadata: rule_name {name};)")));
        // The tenant's own options are retained verbatim.
        assert!(stamped.contains("content:\"www.example.com\"; startswith; endswith;"));
    }

    #[test]
    fn custom_rule_requires_options() {
        let synth = synthesizer(false);
        let mut set = set();
        let rule = "pass tcp $a123456789012abcdef123 any -> $EXTERNAL_NET any";
        assert!(matches!(
            synth.add_rule(&mut set, "custom", rule),
            Err(SynthesisError::MissingRuleOptions(_))
        ));
    }

    #[test]
    fn custom_rule_with_wrong_ip_set_variable_is_rejected() {
        let synth = synthesizer(false);
        let mut set = set();
        let rule = "pass tls $aothertenant any -> $EXTERNAL_NET any \
                    (tls.sni; content:\"www.example.com\";)";
        assert!(matches!(
            synth.add_rule(&mut set, "custom", rule),
            Err(SynthesisError::IpSetVariableMismatch(_))
        ));
    }

    #[test]
    fn custom_rule_with_reserved_keyword_is_rejected() {
        let synth = synthesizer(false);
        for reserved in ["msg:\"x\";", "sid:7;", "metadata: foo bar;", "priority:1;"] {
            let mut set = set();
            let rule = format!(
                "pass tls $a123456789012abcdef123 any -> $EXTERNAL_NET any \
                 (tls.sni; content:\"www.example.com\"; {reserved})"
            );
            assert!(
                matches!(
                    synth.add_rule(&mut set, "custom", &rule),
                    Err(SynthesisError::ReservedKeyword(_))
                ),
                "{reserved} should be rejected"
            );
        }
    }

    #[test]
    fn custom_rule_without_content_is_rejected() {
        let synth = synthesizer(false);
        let mut set = set();
        let rule = "pass tcp $a123456789012abcdef123 any -> $EXTERNAL_NET 22 \
                    (flow:to_server, established;)";
        assert!(matches!(
            synth.add_rule(&mut set, "custom", rule),
            Err(SynthesisError::MissingContent(_))
        ));
    }

    #[test]
    fn custom_rule_with_lone_tld_content_is_rejected() {
        let synth = synthesizer(false);
        let mut set = set();
        let rule = "pass tls $a123456789012abcdef123 any -> $EXTERNAL_NET any \
                    (tls.sni; content:\".org\";)";
        assert!(matches!(
            synth.add_rule(&mut set, "custom", rule),
            Err(SynthesisError::LoneTld(_))
        ));
    }

    #[test]
    fn custom_rule_with_unknown_protocol_fails_base_format() {
        let synth = synthesizer(false);
        let mut set = set();
        let rule = "pass quic $a123456789012abcdef123 any -> $EXTERNAL_NET any \
                    (content:\"x\";)";
        assert!(matches!(
            synth.add_rule(&mut set, "custom", rule),
            Err(SynthesisError::InvalidBaseFormat(_))
        ));
    }

    #[test]
    fn every_compiled_rule_carries_exactly_one_stamp() {
        let synth = synthesizer(true);
        let mut set = set();
        synth.add_rule(&mut set, "https", ".example.com").unwrap();
        synth.add_rule(&mut set, "http", "example.org:8080").unwrap();
        synth
            .add_rule(
                &mut set,
                "custom",
                "pass tcp $a123456789012abcdef123 any -> $EXTERNAL_NET 22 \
                 (content:\"ssh\"; flow:to_server;)",
            )
            .unwrap();

        for (name, rule) in set.rules() {
            let extracted = RuleName::extract(rule).unwrap();
            assert_eq!(extracted.as_str(), name);
        }
    }
}
