use super::{AuthMethod, Credential};
use crate::{VaultClient, VaultError};
use async_trait::async_trait;

/// Static token authentication
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthMethod for StaticTokenAuth {
    async fn authenticate(&self, _client: &VaultClient) -> Result<Credential, VaultError> {
        Ok(Credential::static_token(self.token.clone()))
    }

    fn supports_renewal(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_auth() {
        let client = VaultClient::builder()
            .base_url("http://vault:8200")
            .build()
            .await
            .unwrap();

        let auth = StaticTokenAuth::new("my-token");
        let credential = auth.authenticate(&client).await.unwrap();
        assert_eq!(credential.token, "my-token");
        assert!(!credential.expires());
        assert!(!auth.supports_renewal());
    }
}
