//! Repository traits for data access
//!
//! These traits define the interface for data storage without specifying
//! the implementation (SQLite, in-memory, etc.)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{BackendRecord, BackendStatus, LogPage, LogQuery, RequestLog};

/// Errors surfaced by repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The alias is already taken by another record
    #[error("alias '{0}' is already in use")]
    DuplicateAlias(String),

    /// The alias does not satisfy the alias format
    #[error("invalid alias '{0}': expected 1-100 lowercase letters, digits or hyphens")]
    InvalidAlias(String),

    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// BackendRecord repository trait
#[async_trait]
pub trait BackendRepository: Send + Sync {
    /// Get all backend records
    async fn list(&self) -> RepoResult<Vec<BackendRecord>>;

    /// Get enabled backend records
    async fn list_enabled(&self) -> RepoResult<Vec<BackendRecord>>;

    async fn get(&self, id: &Uuid) -> RepoResult<Option<BackendRecord>>;

    async fn get_by_alias(&self, alias: &str) -> RepoResult<Option<BackendRecord>>;

    /// Create a record (fails with `DuplicateAlias` if the alias is taken)
    async fn create(&self, record: &BackendRecord) -> RepoResult<()>;

    /// Update a record (fails with `DuplicateAlias` if the alias is taken)
    async fn update(&self, record: &BackendRecord) -> RepoResult<()>;

    async fn delete(&self, id: &Uuid) -> RepoResult<()>;

    /// Persist a liveness result
    async fn update_status(
        &self,
        id: &Uuid,
        status: BackendStatus,
        checked_at: Option<DateTime<Utc>>,
    ) -> RepoResult<()>;
}

/// Request log repository trait (append-only)
#[async_trait]
pub trait RequestLogRepository: Send + Sync {
    async fn append(&self, log: &RequestLog) -> RepoResult<()>;

    /// Filtered page, newest first, with the total match count
    async fn query(&self, query: &LogQuery) -> RepoResult<LogPage>;
}
