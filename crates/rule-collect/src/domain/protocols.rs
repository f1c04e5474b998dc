// crates/rule-collect/src/domain/protocols.rs

use serde::Deserialize;
use std::collections::BTreeMap;

/// The protocol table bundled with the compiler, loaded once at startup.
/// Predefined keys are shorthands whose spec is a domain; custom protocols
/// are the ones accepted in the base of a tenant-supplied Suricata rule.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolTable {
    #[serde(rename = "PredfinedRuleProtocols")]
    predefined: BTreeMap<String, String>,
    #[serde(rename = "CustomRuleProtocols")]
    custom: Vec<String>,
}

impl ProtocolTable {
    /// The table shipped in `data/protocols.yaml`.
    pub fn bundled() -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(include_str!("../../data/protocols.yaml"))
    }

    pub fn is_predefined(&self, key: &str) -> bool {
        self.predefined.contains_key(key)
    }

    /// Suricata sticky-buffer keyword for a predefined key, e.g.
    /// `https -> tls.sni`.
    pub fn suricata_keyword(&self, key: &str) -> Option<&str> {
        self.predefined.get(key).map(String::as_str)
    }

    /// Every protocol token accepted in a custom rule base: the predefined
    /// keys plus the custom protocol list.
    pub fn allowed_protocols(&self) -> Vec<&str> {
        self.predefined
            .keys()
            .map(String::as_str)
            .chain(self.custom.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_table_loads_and_maps_https_to_tls_sni() {
        let table = ProtocolTable::bundled().unwrap();
        assert!(table.is_predefined("https"));
        assert_eq!(table.suricata_keyword("https"), Some("tls.sni"));
        assert_eq!(table.suricata_keyword("http"), Some("http.host"));
        assert!(!table.is_predefined("custom"));
        assert!(table.allowed_protocols().contains(&"tcp"));
    }
}
