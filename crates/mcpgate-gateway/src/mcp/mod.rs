//! MCP Server Implementation
//!
//! Implements the Model Context Protocol server using rmcp's ServerHandler
//! trait; the HTTP side is rmcp's StreamableHttpService (see `server`).

pub mod handler;

pub use handler::{to_mcp_error, McpGateHandler};
