//! SQLite implementation of RequestLogRepository.

use std::sync::Arc;

use async_trait::async_trait;
use mcpgate_core::{
    CallStatus, LogPage, LogQuery, RepoError, RepoResult, RequestLog, RequestLogRepository,
};
use rusqlite::{params, params_from_iter};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{format_datetime, parse_datetime};
use crate::Database;

/// SQLite-backed implementation of RequestLogRepository.
pub struct SqliteRequestLogRepository {
    db: Arc<Mutex<Database>>,
}

fn sql(e: rusqlite::Error) -> RepoError {
    RepoError::Other(e.into())
}

impl SqliteRequestLogRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    const SELECT_COLUMNS: &'static str =
        "id, tool_name, alias, backend_id, latency_ms, status, error_message, created_at";

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<RequestLog> {
        let id: String = row.get(0)?;
        let backend_id: Option<String> = row.get(3)?;
        let latency_ms: i64 = row.get(4)?;
        let status: String = row.get(5)?;
        let created_at: String = row.get(7)?;

        Ok(RequestLog {
            id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
            tool_name: row.get(1)?,
            alias: row.get(2)?,
            backend_id: backend_id.and_then(|s| Uuid::parse_str(&s).ok()),
            latency_ms: latency_ms.max(0) as u64,
            status: CallStatus::parse(&status).unwrap_or(CallStatus::Error),
            error_message: row.get(6)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// Build the WHERE clause and its positional parameters.
    fn filter(query: &LogQuery) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(alias) = &query.alias {
            values.push(alias.clone());
            clauses.push(format!("alias = ?{}", values.len()));
        }
        if let Some(status) = query.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(from) = &query.from {
            values.push(format_datetime(from));
            clauses.push(format!("created_at >= ?{}", values.len()));
        }
        if let Some(to) = &query.to {
            values.push(format_datetime(to));
            clauses.push(format!("created_at <= ?{}", values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

#[async_trait]
impl RequestLogRepository for SqliteRequestLogRepository {
    async fn append(&self, log: &RequestLog) -> RepoResult<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        // backend_id is dropped to NULL if the record no longer exists
        conn.execute(
            "INSERT INTO request_logs
             (id, tool_name, alias, backend_id, latency_ms, status, error_message, created_at)
             VALUES (?1, ?2, ?3, (SELECT id FROM backends WHERE id = ?4), ?5, ?6, ?7, ?8)",
            params![
                log.id.to_string(),
                log.tool_name,
                log.alias,
                log.backend_id.map(|id| id.to_string()),
                log.latency_ms as i64,
                log.status.as_str(),
                log.error_message,
                format_datetime(&log.created_at),
            ],
        )
        .map_err(sql)?;

        Ok(())
    }

    async fn query(&self, query: &LogQuery) -> RepoResult<LogPage> {
        let (where_clause, values) = Self::filter(query);

        let db = self.db.lock().await;
        let conn = db.connection();

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM request_logs {}", where_clause),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(sql)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM request_logs {} ORDER BY created_at DESC, rowid DESC LIMIT {} OFFSET {}",
                Self::SELECT_COLUMNS,
                where_clause,
                query.effective_limit(),
                query.effective_offset()
            ))
            .map_err(sql)?;

        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)
            .map_err(sql)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql)?;

        Ok(LogPage {
            rows,
            total: total.max(0) as u64,
        })
    }
}
