// crates/shared/src/rule_name.rs

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::digest;

#[derive(Debug, thiserror::Error)]
pub enum RuleNameError {
    #[error("invalid rule name format: {0}")]
    InvalidFormat(String),
    #[error("no rule_name stamp found in rule: {0}")]
    MissingStamp(String),
    #[error("more than one rule_name stamp found in rule: {0}")]
    AmbiguousStamp(String),
}

/// The content-addressed rule identity `<account>-<vpc>-<hash10>`, stamped
/// into the `metadata` field of every rule this system writes. It is the sole
/// identity used during reconciliation: two live rules with the same name are
/// guaranteed byte-identical, so reinsertion is a no-op.
///
/// The inner string is private to force construction through the validating
/// constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleName(String);

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)-([0-9a-zA-Z]+)-([0-9a-zA-Z]+)$").expect("valid regex"))
}

fn stamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"metadata:\s*rule_name\s+(\d+-[0-9a-zA-Z]+-[0-9a-zA-Z]+)")
            .expect("valid regex")
    })
}

impl RuleName {
    /// Derives the rule name for the given scope from the rule's defining
    /// content. Identical input always yields the identical name.
    pub fn derive(account: &str, vpc: &str, digest_input: &str) -> Self {
        Self(format!("{account}-{vpc}-{}", digest::hash10(digest_input)))
    }

    /// Parses a bare `<account>-<vpc>-<hash>` string.
    pub fn parse(input: &str) -> Result<Self, RuleNameError> {
        if name_regex().is_match(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(RuleNameError::InvalidFormat(input.to_string()))
        }
    }

    /// Extracts the rule name from the `metadata: rule_name <id>` stamp of a
    /// Suricata rule string. Exactly one stamp must be present.
    pub fn extract(rule_string: &str) -> Result<Self, RuleNameError> {
        let mut stamps = stamp_regex().captures_iter(rule_string);
        let first = stamps
            .next()
            .ok_or_else(|| RuleNameError::MissingStamp(rule_string.to_string()))?;
        if stamps.next().is_some() {
            return Err(RuleNameError::AmbiguousStamp(rule_string.to_string()));
        }
        Ok(Self(first[1].to_string()))
    }

    pub fn account(&self) -> &str {
        self.0.splitn(3, '-').next().unwrap_or_default()
    }

    pub fn vpc(&self) -> &str {
        self.0.splitn(3, '-').nth(1).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
