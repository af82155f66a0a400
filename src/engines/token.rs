use super::PATH_PREFIX;
use crate::auth::AuthInfo;
use crate::client::Service;
use crate::{VaultClient, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_MOUNT: &str = "auth";

/// The token auth backend.
#[derive(Debug, Clone)]
pub struct TokenAuth {
    service: Service,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateTokenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_parent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_default_policy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
    /// Duration string such as `1h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_alias: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTokenResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    pub auth: AuthInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenLookupResponse {
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub creation_ttl: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub entity_id: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
    #[serde(default)]
    pub meta: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct LookupEnvelope {
    data: TokenLookupResponse,
}

impl TokenAuth {
    pub fn new(client: VaultClient) -> Self {
        Self::with_mount(client, DEFAULT_MOUNT)
    }

    pub fn with_mount(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            service: Service::new(client, mount),
        }
    }

    pub fn mount(&self) -> &str {
        self.service.mount()
    }

    /// Create a token without a parent, so it outlives the caller's token.
    pub async fn create_orphan(
        &self,
        request: &CreateTokenRequest,
    ) -> Result<CreateTokenResponse, VaultError> {
        self.service
            .client()
            .write(&[PATH_PREFIX, self.mount(), "token", "create-orphan"], request, None)
            .await
    }

    /// Information about the client's own token.
    pub async fn lookup_self(&self) -> Result<TokenLookupResponse, VaultError> {
        let response: LookupEnvelope = self
            .service
            .client()
            .read(&[PATH_PREFIX, self.mount(), "token", "lookup-self"], None)
            .await?;
        Ok(response.data)
    }
}

impl VaultClient {
    pub fn token_auth(&self) -> TokenAuth {
        TokenAuth::new(self.clone())
    }
}
