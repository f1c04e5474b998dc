// crates/rule-execute/src/domain/mod.rs

pub mod default_deny;

pub use default_deny::DefaultDenyRules;
