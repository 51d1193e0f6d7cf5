//! BackendRecord entity - one downstream MCP server registered with the gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum alias length (matches the persisted column width).
pub const MAX_ALIAS_LEN: usize = 100;

/// How the gateway authenticates against a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// No credential is attached
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `X-API-Key: <key>`
    ApiKey,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer => "bearer",
            Self::ApiKey => "api_key",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "bearer" => Some(Self::Bearer),
            "api_key" => Some(Self::ApiKey),
            _ => None,
        }
    }
}

/// Last known liveness of a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Persisted description of a backend MCP server.
///
/// The alias is globally unique and is the only key the gateway routes on:
/// every tool the backend exposes is published as `<alias>__<tool>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRecord {
    /// Unique record ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Routing alias (lowercase alphanumeric and hyphens)
    pub alias: String,

    /// Streamable HTTP endpoint of the backend
    pub url: String,

    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub auth_kind: AuthKind,

    /// Credential sealed by the vault (hex), never the raw secret
    pub encrypted_credential: Option<String>,

    /// Disabled records are never connected
    pub enabled: bool,

    pub status: BackendStatus,

    pub last_checked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl BackendRecord {
    /// Create a new enabled record with no credential.
    pub fn new(name: impl Into<String>, alias: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            alias: alias.into(),
            url: url.into(),
            description: None,
            tags: Vec::new(),
            auth_kind: AuthKind::None,
            encrypted_credential: None,
            enabled: true,
            status: BackendStatus::Unknown,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach an already-encrypted credential.
    pub fn with_credential(mut self, auth_kind: AuthKind, encrypted: impl Into<String>) -> Self {
        self.auth_kind = auth_kind;
        self.encrypted_credential = Some(encrypted.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_status(mut self, status: BackendStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether a credential header must be attached when connecting.
    pub fn requires_credential(&self) -> bool {
        self.auth_kind != AuthKind::None
    }
}

/// Check that an alias is lowercase alphanumeric with hyphens, 1-100 chars.
pub fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty()
        && alias.len() <= MAX_ALIAS_LEN
        && alias
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
