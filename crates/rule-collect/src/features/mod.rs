// crates/rule-collect/src/features/mod.rs

pub mod compile_event;
