use super::{AuthMethod, AuthResponse, Credential};
use crate::client::RequestOptions;
use crate::{VaultClient, VaultError};
use async_trait::async_trait;
use serde::Serialize;

pub const DEFAULT_MOUNT: &str = "userpass";

/// Username/password authentication
pub struct UserpassAuth {
    pub mount: String,
    pub username: String,
    password: String,
}

impl UserpassAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mount: DEFAULT_MOUNT.to_string(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }
}

impl std::fmt::Debug for UserpassAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserpassAuth")
            .field("mount", &self.mount)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

#[async_trait]
impl AuthMethod for UserpassAuth {
    async fn authenticate(&self, client: &VaultClient) -> Result<Credential, VaultError> {
        let response: AuthResponse = client
            .write(
                &["v1", "auth", self.mount.as_str(), "login", self.username.as_str()],
                &LoginRequest {
                    password: &self.password,
                },
                Some(RequestOptions::without_renewal()),
            )
            .await?;

        tracing::info!(mount = %self.mount, username = %self.username, "Authenticated with userpass");
        Ok(response.into())
    }

    fn supports_renewal(&self) -> bool {
        true
    }
}
