// crates/shared/src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enums::RuleEvent;

/// One compilation result per VPC, produced by the intent compiler and
/// consumed by the reconciler. The field names are the wire contract of the
/// queue body and must stay consistent between producer and consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationMessage {
    /// VPC id without the `vpc-` prefix. Empty for account-scoped deletes.
    #[serde(rename = "VPC")]
    pub vpc: String,
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Region")]
    pub region: String,
    /// Primary CIDR of the VPC; the definition of its IP-set variable.
    #[serde(rename = "CIDR")]
    pub cidr: String,
    /// rule_name -> fully stamped Suricata rule string.
    #[serde(rename = "Rules")]
    pub rules: BTreeMap<String, String>,
}

impl CompilationMessage {
    /// A message with no rules, used by the delete events where the scope
    /// fields carry the whole meaning.
    pub fn empty(account: impl Into<String>, vpc: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            vpc: vpc.into(),
            account: account.into(),
            region: region.into(),
            cidr: String::new(),
            rules: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

/// String attributes attached to every queue message. `account` doubles as
/// the FIFO message group id, which is what serializes all events of one
/// tenant while letting tenants interleave freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributes {
    pub event: RuleEvent,
    pub account: String,
    pub region: String,
    pub version: String,
    pub logstream_name: String,
}

impl MessageAttributes {
    pub fn group_id(&self) -> &str {
        &self.account
    }
}
