// crates/rule-execute/src/features/mod.rs

pub mod apply_rules;
