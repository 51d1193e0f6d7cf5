//! Gateway integration tests
//!
//! Registry reconciliation, catalog aggregation, call routing, health
//! probing and shutdown, all against mock backends.

mod lifecycle;
mod registry;
