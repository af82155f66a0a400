use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault not detected: VAULT_ADDR not set")]
    VaultNotDetected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to marshal body as JSON: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Vault returned {status}: {}", .errors.join(", "))]
    Api { status: u16, errors: Vec<String> },

    #[error("error unmarshalling body into response: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("token renew after request returned 403 failed: {0}")]
    TokenRenewal(#[source] Box<VaultError>),

    #[error("creating a new token failed after token renew failed with: {renew_error}")]
    Reauthentication {
        renew_error: String,
        #[source]
        source: Box<VaultError>,
    },

    #[error("tls config reload failed after request failed with {cause:?}: {source}")]
    TlsReload {
        cause: String,
        #[source]
        source: Box<VaultError>,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Failed to read identity token from {path}: {source}")]
    IdentityToken {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret not found: {path}")]
    SecretNotFound { path: String },

    #[error("encryption key not found")]
    EncryptionKeyNotFound,

    #[error("Failed to decode response payload: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// HTTP status reported by the server, if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error messages reported by the server.
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Api { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Builds an `Api` error from a non-2xx response body.
    ///
    /// Vault answers with `{"errors": [...]}`; anything else is kept as a
    /// single raw message.
    pub(crate) fn from_response(status: u16, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorResponse {
            #[serde(default)]
            errors: Vec<String>,
        }

        let errors = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(parsed) => parsed.errors,
            Err(_) => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() { Vec::new() } else { vec![text] }
            }
        };

        Self::Api { status, errors }
    }
}
