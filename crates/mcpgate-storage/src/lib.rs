//! McpGate Storage Layer
//!
//! SQLite persistence for backend records and request logs, plus the
//! credential vault that seals backend secrets at rest.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Gateway engine                      │
//! ├──────────────────────────────────────────────────────┤
//! │               Repository Traits                      │
//! │   (BackendRepository, RequestLogRepository)          │
//! ├──────────────────────────────────────────────────────┤
//! │            SQLite Implementations                    │
//! │ (SqliteBackendRepository, SqliteRequestLogRepository)│
//! ├──────────────────────────────────────────────────────┤
//! │        CredentialVault (AES-256-GCM)                 │
//! ├──────────────────────────────────────────────────────┤
//! │                   Database                           │
//! │                   (SQLite)                           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcpgate_storage::{CredentialVault, Database, SqliteBackendRepository};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let vault = CredentialVault::from_hex_key(&config.encryption_key_hex)?;
//! let db = Arc::new(Mutex::new(Database::open(&config.database_path)?));
//! let backends = SqliteBackendRepository::new(db.clone());
//! ```

pub mod crypto;
mod database;
mod repositories;

pub use crypto::{generate_key, CredentialVault, CryptoError, KEY_SIZE};
pub use database::Database;
pub use repositories::*;
