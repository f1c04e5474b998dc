// crates/rule-execute/src/lib.rs

pub mod domain;
pub mod features;

pub use features::apply_rules::{ApplyRulesUseCase, ReconcileError, ReconcilerSettings};
