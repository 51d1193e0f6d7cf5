//! Request log types - one row per proxied tool call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest page a log query may return.
pub const MAX_LOG_LIMIT: u32 = 500;

/// Page size used when a query does not specify one.
pub const DEFAULT_LOG_LIMIT: u32 = 100;

/// Outcome of a proxied call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Transient record of one tool call, handed to the log and metrics collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Original (un-prefixed) tool name
    pub tool_name: String,
    pub alias: String,
    pub backend_id: Uuid,
    pub latency_ms: u64,
    pub status: CallStatus,
    pub error_message: Option<String>,
}

impl CallOutcome {
    pub fn success(
        tool_name: impl Into<String>,
        alias: impl Into<String>,
        backend_id: Uuid,
        latency_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            alias: alias.into(),
            backend_id,
            latency_ms,
            status: CallStatus::Success,
            error_message: None,
        }
    }

    pub fn error(
        tool_name: impl Into<String>,
        alias: impl Into<String>,
        backend_id: Uuid,
        latency_ms: u64,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            alias: alias.into(),
            backend_id,
            latency_ms,
            status: CallStatus::Error,
            error_message: Some(error_message.into()),
        }
    }
}

/// Persisted request log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: Uuid,
    pub tool_name: String,
    pub alias: String,
    /// Cleared when the backend record is deleted
    pub backend_id: Option<Uuid>,
    pub latency_ms: u64,
    pub status: CallStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestLog {
    /// Build a row from a call outcome, stamped now.
    pub fn from_outcome(outcome: &CallOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: outcome.tool_name.clone(),
            alias: outcome.alias.clone(),
            backend_id: Some(outcome.backend_id),
            latency_ms: outcome.latency_ms,
            status: outcome.status,
            error_message: outcome.error_message.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Filter and pagination for request log reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    pub alias: Option<String>,
    pub status: Option<CallStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LogQuery {
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_status(mut self, status: CallStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_range(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Page size clamped to `1..=MAX_LOG_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// One page of request logs plus the unpaginated match count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub rows: Vec<RequestLog>,
    pub total: u64,
}
