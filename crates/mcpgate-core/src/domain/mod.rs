//! Domain entities and value objects
//!
//! - Backend records (the persisted description of one downstream MCP server)
//! - Request log rows and the call outcomes they are built from
//! - Gateway configuration

mod backend;
pub mod config;
mod request_log;

pub use backend::*;
pub use config::{ConfigError, CorsOrigins, GatewayConfig};
pub use request_log::*;
