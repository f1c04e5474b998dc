// crates/shared/src/enums.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event kinds carried on the transport queue. The kind is always explicit
/// on the message attributes; it is never inferred from which body fields
/// happen to be populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleEvent {
    /// Replace the rule set of one (account, vpc) scope.
    Update,
    /// Remove every rule and IP set belonging to one (account, vpc) scope.
    DeleteVpc,
    /// Remove every rule of an account within the bound region.
    DeleteS3,
    /// Remove every rule of an account across all supported regions.
    DeleteAccount,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct ParseRuleEventError(String);

impl FromStr for RuleEvent {
    type Err = ParseRuleEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Update" => Ok(RuleEvent::Update),
            "DeleteVpc" => Ok(RuleEvent::DeleteVpc),
            "DeleteS3" => Ok(RuleEvent::DeleteS3),
            "DeleteAccount" => Ok(RuleEvent::DeleteAccount),
            other => Err(ParseRuleEventError(other.to_string())),
        }
    }
}

impl fmt::Display for RuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleEvent::Update => "Update",
            RuleEvent::DeleteVpc => "DeleteVpc",
            RuleEvent::DeleteS3 => "DeleteS3",
            RuleEvent::DeleteAccount => "DeleteAccount",
        };
        f.write_str(name)
    }
}
