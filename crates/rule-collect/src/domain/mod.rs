// crates/rule-collect/src/domain/mod.rs

pub mod intent;
pub mod protocols;
pub mod schema;
pub mod synthesizer;

pub use intent::{IntentDocument, VpcPolicy};
pub use protocols::ProtocolTable;
pub use schema::{DocumentSchema, SchemaError};
pub use synthesizer::{RuleSet, RuleSynthesizer, SynthesisError};
