// crates/rule-execute/src/features/apply_rules/mod.rs

pub mod adapter;
pub mod di;
pub mod error;
pub mod ports;
pub mod registry;
pub mod use_case;

#[cfg(any(test, feature = "test-util"))]
pub mod mocks;

#[cfg(test)]
mod use_case_test;

// Expose only the public parts of the feature.
pub use di::ApplyRulesDIContainer;
pub use error::ReconcileError;
pub use registry::ResourceRegistry;
pub use use_case::{ApplyRulesUseCase, ReconcilerSettings};
