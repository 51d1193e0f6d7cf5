//! # McpGate Core Library
//!
//! Domain types, data-access traits, and configuration shared by the
//! storage layer and the gateway engine.
//!
//! ## Modules
//!
//! - `domain` - Backend records, request log rows, gateway configuration
//! - `repository` - Data access traits

pub mod domain;
pub mod repository;

// Re-export commonly used types
pub use domain::*;
pub use repository::*;
