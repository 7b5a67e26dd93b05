// packages/rebind/src/utils/mod.rs
//! Shared utilities: error types and environment configuration

pub mod config;
pub mod errors;

pub use config::{RebindConfig, RedirectRule};
pub use errors::{RebindError, Result};
