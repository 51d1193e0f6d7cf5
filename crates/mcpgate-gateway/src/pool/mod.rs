//! Connection pool for backend MCP servers
//!
//! - `client` - the `BackendClient` capability and its rmcp implementation
//! - `transport` - Streamable HTTP connector with credential headers
//! - `connection` - a live session paired with its record snapshot
//! - `registry` - the alias-keyed live set and its reconcile loop
//! - `settled` - gather-all-settled combinator

mod client;
mod connection;
mod registry;
mod settled;
mod transport;

pub use client::{BackendClient, BackendError, McpClient, McpClientHandler, RmcpBackendClient};
pub use connection::{ActiveConnection, Liveness};
pub use registry::{ReconcileReport, ServerRegistry};
pub use settled::gather_settled;
pub use transport::{auth_headers, BackendConnector, HttpBackendConnector, API_KEY_HEADER};
