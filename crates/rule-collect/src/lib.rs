// crates/rule-collect/src/lib.rs

pub mod domain;
pub mod features;

pub use features::compile_event::{CollectEvent, CompileError, CompileEventUseCase};
