//! Streamable HTTP Transport Integration Tests
//!
//! Runs a real rmcp backend and the gateway router on loopback ports and
//! drives the gateway with an rmcp client:
//! - Namespaced tool listing
//! - Routed calls with credential headers and request logging
//! - Backend error pass-through
//! - Health routes

mod end_to_end;
