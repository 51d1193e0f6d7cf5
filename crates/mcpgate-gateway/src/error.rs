//! Gateway error types

use mcpgate_storage::CryptoError;

use crate::pool::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Unresolvable tool name or unknown alias
    #[error("Tool '{0}' not found")]
    OperationNotFound(String),

    /// Backend unreachable or handshake failed
    #[error("failed to connect to backend '{alias}': {reason}")]
    Connection { alias: String, reason: String },

    /// Stored credential failed to decrypt (tampered or wrong key)
    #[error("credential for backend '{alias}' could not be opened: {source}")]
    Credential {
        alias: String,
        #[source]
        source: CryptoError,
    },

    /// Failure reported by the backend while serving a call
    #[error(transparent)]
    Downstream(#[from] BackendError),
}
