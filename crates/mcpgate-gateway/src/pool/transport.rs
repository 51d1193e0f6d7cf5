//! Outbound transport for backend MCP servers
//!
//! Handles connecting to backends over Streamable HTTP with the decrypted
//! credential attached as a default header on every request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpgate_core::{AuthKind, BackendRecord};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::ServiceExt;
use tracing::{debug, error, info};

use super::client::{BackendClient, BackendError, McpClientHandler, RmcpBackendClient};

/// Header carrying API keys.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Opens a live client session for a backend record.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Open the transport and complete the MCP handshake.
    async fn connect(
        &self,
        record: &BackendRecord,
        headers: HeaderMap,
    ) -> Result<Arc<dyn BackendClient>, BackendError>;
}

/// Build the auth header for a decrypted credential.
pub fn auth_headers(kind: AuthKind, secret: &str) -> Result<HeaderMap, BackendError> {
    let mut header_map = HeaderMap::new();
    let (name, value) = match kind {
        AuthKind::None => return Ok(header_map),
        AuthKind::Bearer => (AUTHORIZATION, format!("Bearer {}", secret)),
        AuthKind::ApiKey => (HeaderName::from_static(API_KEY_HEADER), secret.to_string()),
    };
    let mut value = HeaderValue::from_str(&value)
        .map_err(|e| BackendError::Handshake(format!("invalid credential header value: {}", e)))?;
    value.set_sensitive(true);
    header_map.insert(name, value);
    Ok(header_map)
}

/// Streamable HTTP connector backed by rmcp + reqwest.
pub struct HttpBackendConnector {
    connect_timeout: Duration,
}

impl HttpBackendConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Build a reqwest::Client with the credential headers as default_headers.
    fn build_http_client(&self, alias: &str, headers: HeaderMap) -> Result<reqwest::Client, BackendError> {
        reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                let err = format!("Failed to build HTTP client: {}", e);
                error!(alias = %alias, "{}", err);
                BackendError::Handshake(err)
            })
    }
}

#[async_trait]
impl BackendConnector for HttpBackendConnector {
    async fn connect(
        &self,
        record: &BackendRecord,
        headers: HeaderMap,
    ) -> Result<Arc<dyn BackendClient>, BackendError> {
        debug!(
            alias = %record.alias,
            url = %record.url,
            header_count = headers.len(),
            "[HttpBackendConnector] Connecting"
        );

        let client = self.build_http_client(&record.alias, headers)?;
        let transport_config = StreamableHttpClientTransportConfig::with_uri(record.url.as_str());
        let transport = StreamableHttpClientTransport::with_client(client, transport_config);

        let connect_future = McpClientHandler::new(&record.alias).serve(transport);
        match tokio::time::timeout(self.connect_timeout, connect_future).await {
            Ok(Ok(service)) => {
                info!(alias = %record.alias, "[HttpBackendConnector] Connected");
                Ok(Arc::new(RmcpBackendClient::new(record.alias.clone(), service)))
            }
            Ok(Err(e)) => Err(BackendError::Handshake(format!("{:#}", e))),
            Err(_) => Err(BackendError::Timeout(self.connect_timeout)),
        }
    }
}
