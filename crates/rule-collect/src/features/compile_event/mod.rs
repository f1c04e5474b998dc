// crates/rule-collect/src/features/compile_event/mod.rs

pub mod adapter;
pub mod di;
pub mod dto;
pub mod error;
pub mod ports;
pub mod use_case;

#[cfg(any(test, feature = "test-util"))]
pub mod mocks;

#[cfg(test)]
mod use_case_test;

// Expose only the public parts of the feature.
pub use di::CompileEventDIContainer;
pub use dto::CollectEvent;
pub use error::CompileError;
pub use use_case::CompileEventUseCase;
