//! SQLite implementation of BackendRepository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcpgate_core::{
    is_valid_alias, AuthKind, BackendRecord, BackendRepository, BackendStatus, RepoError,
    RepoResult,
};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{format_datetime, parse_datetime};
use crate::Database;

/// SQLite-backed implementation of BackendRepository.
pub struct SqliteBackendRepository {
    db: Arc<Mutex<Database>>,
}

fn sql(e: rusqlite::Error) -> RepoError {
    RepoError::Other(e.into())
}

/// Map a write failure, turning the alias UNIQUE constraint into a conflict.
fn write_err(e: rusqlite::Error, alias: &str) -> RepoError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = e {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return RepoError::DuplicateAlias(alias.to_string());
        }
    }
    sql(e)
}

impl SqliteBackendRepository {
    /// Create a new SQLite backend repository.
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    const SELECT_COLUMNS: &'static str =
        "id, name, alias, url, description, tags, auth_kind, encrypted_credential, enabled,
         status, last_checked_at, created_at, updated_at";

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<BackendRecord> {
        let id: String = row.get(0)?;
        let tags: String = row.get(5)?;
        let auth_kind: String = row.get(6)?;
        let status: String = row.get(9)?;
        let last_checked_at: Option<String> = row.get(10)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;

        Ok(BackendRecord {
            id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
            name: row.get(1)?,
            alias: row.get(2)?,
            url: row.get(3)?,
            description: row.get(4)?,
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            auth_kind: AuthKind::parse(&auth_kind).unwrap_or_default(),
            encrypted_credential: row.get(7)?,
            enabled: row.get(8)?,
            status: BackendStatus::parse(&status).unwrap_or_default(),
            last_checked_at: last_checked_at.as_deref().map(parse_datetime),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    fn serialize_tags(tags: &[String]) -> String {
        serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
    }

    fn check_alias(alias: &str) -> RepoResult<()> {
        if is_valid_alias(alias) {
            Ok(())
        } else {
            Err(RepoError::InvalidAlias(alias.to_string()))
        }
    }

    async fn select(&self, clause: &str, param: Option<String>) -> RepoResult<Vec<BackendRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM backends {} ORDER BY created_at ASC",
                Self::SELECT_COLUMNS,
                clause
            ))
            .map_err(sql)?;

        let rows = match param {
            Some(p) => stmt.query_map([p], Self::map_row),
            None => stmt.query_map([], Self::map_row),
        }
        .map_err(sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql)?;

        Ok(rows)
    }
}

#[async_trait]
impl BackendRepository for SqliteBackendRepository {
    async fn list(&self) -> RepoResult<Vec<BackendRecord>> {
        self.select("", None).await
    }

    async fn list_enabled(&self) -> RepoResult<Vec<BackendRecord>> {
        self.select("WHERE enabled = 1", None).await
    }

    async fn get(&self, id: &Uuid) -> RepoResult<Option<BackendRecord>> {
        Ok(self
            .select("WHERE id = ?1", Some(id.to_string()))
            .await?
            .into_iter()
            .next())
    }

    async fn get_by_alias(&self, alias: &str) -> RepoResult<Option<BackendRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM backends WHERE alias = ?1",
                Self::SELECT_COLUMNS
            ))
            .map_err(sql)?;

        stmt.query_row([alias], Self::map_row)
            .optional()
            .map_err(sql)
    }

    async fn create(&self, record: &BackendRecord) -> RepoResult<()> {
        Self::check_alias(&record.alias)?;

        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "INSERT INTO backends
             (id, name, alias, url, description, tags, auth_kind, encrypted_credential, enabled,
              status, last_checked_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id.to_string(),
                record.name,
                record.alias,
                record.url,
                record.description,
                Self::serialize_tags(&record.tags),
                record.auth_kind.as_str(),
                record.encrypted_credential,
                record.enabled,
                record.status.as_str(),
                record.last_checked_at.as_ref().map(format_datetime),
                format_datetime(&record.created_at),
                format_datetime(&record.updated_at),
            ],
        )
        .map_err(|e| write_err(e, &record.alias))?;

        Ok(())
    }

    async fn update(&self, record: &BackendRecord) -> RepoResult<()> {
        Self::check_alias(&record.alias)?;

        let db = self.db.lock().await;
        let conn = db.connection();

        let changed = conn
            .execute(
                "UPDATE backends
                 SET name = ?2, alias = ?3, url = ?4, description = ?5, tags = ?6, auth_kind = ?7,
                     encrypted_credential = ?8, enabled = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    record.id.to_string(),
                    record.name,
                    record.alias,
                    record.url,
                    record.description,
                    Self::serialize_tags(&record.tags),
                    record.auth_kind.as_str(),
                    record.encrypted_credential,
                    record.enabled,
                    format_datetime(&Utc::now()),
                ],
            )
            .map_err(|e| write_err(e, &record.alias))?;

        if changed == 0 {
            return Err(RepoError::NotFound(record.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> RepoResult<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let changed = conn
            .execute("DELETE FROM backends WHERE id = ?1", [id.to_string()])
            .map_err(sql)?;

        if changed == 0 {
            return Err(RepoError::NotFound(*id));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: &Uuid,
        status: BackendStatus,
        checked_at: Option<DateTime<Utc>>,
    ) -> RepoResult<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        // A missing row is not an error: the record may have been deleted
        // while a probe or connect was in flight.
        conn.execute(
            "UPDATE backends
             SET status = ?2, last_checked_at = COALESCE(?3, last_checked_at)
             WHERE id = ?1",
            params![
                id.to_string(),
                status.as_str(),
                checked_at.as_ref().map(format_datetime),
            ],
        )
        .map_err(sql)?;

        Ok(())
    }
}
