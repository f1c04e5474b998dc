// crates/rule-collect/src/domain/schema.rs

use crate::domain::intent::IntentDocument;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The bundled schema itself is unreadable. This is our bug, never the
    /// tenant's.
    #[error("unable to load the bundled document schema: {0}")]
    Load(String),
    #[error("document is not valid YAML: {0}")]
    Parse(String),
    #[error("document not compliant with schema: {0}")]
    Violation(String),
}

/// Validates intent documents against the bundled JSON schema. The schema is
/// compiled once and reused for every document of the invocation.
pub struct DocumentSchema {
    validator: jsonschema::Validator,
}

impl DocumentSchema {
    pub fn bundled() -> Result<Self, SchemaError> {
        let raw: serde_json::Value = serde_json::from_str(include_str!("../../schema.json"))
            .map_err(|e| SchemaError::Load(e.to_string()))?;
        let validator =
            jsonschema::validator_for(&raw).map_err(|e| SchemaError::Load(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Parses the YAML body and checks it against the schema before any rule
    /// is looked at. A failure rejects the whole document.
    pub fn parse_and_validate(&self, body: &str) -> Result<IntentDocument, SchemaError> {
        let value: serde_json::Value =
            serde_yaml::from_str(body).map_err(|e| SchemaError::Parse(e.to_string()))?;
        self.validator
            .validate(&value)
            .map_err(|e| SchemaError::Violation(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| SchemaError::Violation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "Version: \"1.0\"\n\
                         Config:\n\
                         - VPC: vpc-0a1b2c3d\n\
                         \x20 Properties:\n\
                         \x20 - https:\n\
                         \x20   - example.com\n";

    #[test]
    fn accepts_a_compliant_document() {
        let schema = DocumentSchema::bundled().unwrap();
        let doc = schema.parse_and_validate(VALID).unwrap();
        assert_eq!(doc.config[0].vpc, "vpc-0a1b2c3d");
    }

    #[test]
    fn rejects_a_document_without_config() {
        let schema = DocumentSchema::bundled().unwrap();
        let result = schema.parse_and_validate("Version: \"1.0\"\n");
        assert!(matches!(result, Err(SchemaError::Violation(_))));
    }

    #[test]
    fn rejects_a_malformed_vpc_id() {
        let schema = DocumentSchema::bundled().unwrap();
        let body = VALID.replace("vpc-0a1b2c3d", "not-a-vpc");
        assert!(matches!(
            schema.parse_and_validate(&body),
            Err(SchemaError::Violation(_))
        ));
    }

    #[test]
    fn rejects_garbage_yaml() {
        let schema = DocumentSchema::bundled().unwrap();
        assert!(matches!(
            schema.parse_and_validate(": [what"),
            Err(SchemaError::Parse(_))
        ));
    }
}
