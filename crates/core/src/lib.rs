//! TipRail Core Types
//!
//! This crate defines the fundamental data structures used throughout TipRail:
//! payment request lifecycle state, verification results and evidence tags,
//! the error taxonomy, and service configuration.

mod config;
mod error;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
