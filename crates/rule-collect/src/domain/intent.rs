// crates/rule-collect/src/domain/intent.rs

use serde::Deserialize;
use std::collections::BTreeMap;

/// The tenant-authored regional configuration document, after schema
/// validation. One document describes the desired allow-lists for every VPC
/// the tenant manages in one region.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Config")]
    pub config: Vec<VpcPolicy>,
}

/// Desired rules for one VPC: a list of single-key maps from protocol key
/// (`https`, `http`, `tls`, `custom`, ...) to rule specs. Predefined keys
/// take a domain (optionally `domain:port`); `custom` takes a full Suricata
/// rule without meta-stamps.
#[derive(Debug, Clone, Deserialize)]
pub struct VpcPolicy {
    #[serde(rename = "VPC")]
    pub vpc: String,
    #[serde(rename = "Properties")]
    pub properties: Vec<BTreeMap<String, Vec<String>>>,
}

impl VpcPolicy {
    /// Flattens the properties list into (protocol key, rule spec) pairs in
    /// document order.
    pub fn rule_specs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().flat_map(|property| {
            property.iter().flat_map(|(key, specs)| {
                specs.iter().map(move |spec| (key.as_str(), spec.as_str()))
            })
        })
    }
}
