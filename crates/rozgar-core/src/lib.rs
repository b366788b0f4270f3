//! Rozgar Core crate - configuration, error type, shared domain types.

pub mod config;
pub mod error;
pub mod types;

pub use config::RozgarConfig;
pub use error::{Result, RozgarError};
pub use types::*;
