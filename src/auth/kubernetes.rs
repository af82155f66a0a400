use super::{AuthMethod, AuthResponse, Credential};
use crate::client::RequestOptions;
use crate::{VaultClient, VaultError};
use async_trait::async_trait;
use serde::Serialize;

pub const DEFAULT_MOUNT: &str = "kubernetes";
pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Kubernetes authentication: trades the pod's service account JWT for a
/// Vault token.
pub struct KubernetesAuth {
    pub mount: String,
    pub role: String,
    pub jwt_path: String,
    jwt: Option<String>,
}

impl KubernetesAuth {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            mount: DEFAULT_MOUNT.to_string(),
            role: role.into(),
            jwt_path: DEFAULT_JWT_PATH.to_string(),
            jwt: None,
        }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    pub fn with_jwt_path(mut self, path: impl Into<String>) -> Self {
        self.jwt_path = path.into();
        self
    }

    /// Use this JWT instead of reading it from `jwt_path`.
    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    async fn read_jwt(&self) -> Result<String, VaultError> {
        if let Some(ref jwt) = self.jwt {
            return Ok(jwt.clone());
        }

        tokio::fs::read_to_string(&self.jwt_path)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|source| VaultError::IdentityToken {
                path: self.jwt_path.clone(),
                source,
            })
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    role: &'a str,
    jwt: String,
}

#[async_trait]
impl AuthMethod for KubernetesAuth {
    async fn authenticate(&self, client: &VaultClient) -> Result<Credential, VaultError> {
        let jwt = self.read_jwt().await?;

        let response: AuthResponse = client
            .write(
                &["v1", "auth", self.mount.as_str(), "login"],
                &LoginRequest {
                    role: &self.role,
                    jwt,
                },
                Some(RequestOptions::without_renewal()),
            )
            .await?;

        tracing::info!(mount = %self.mount, role = %self.role, "Authenticated with Kubernetes auth");
        Ok(response.into())
    }

    fn supports_renewal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_jwt_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "my-jwt-token").unwrap();

        let auth = KubernetesAuth::new("app").with_jwt_path(file.path().to_str().unwrap());

        let jwt = auth.read_jwt().await.unwrap();
        assert_eq!(jwt, "my-jwt-token");
    }

    #[tokio::test]
    async fn test_read_jwt_missing_file() {
        let auth = KubernetesAuth::new("app").with_jwt_path("/nonexistent/path");

        let result = auth.read_jwt().await;
        assert!(matches!(
            result,
            Err(VaultError::IdentityToken { ref path, .. }) if path == "/nonexistent/path"
        ));
    }

    #[tokio::test]
    async fn test_explicit_jwt_skips_file() {
        let auth = KubernetesAuth::new("app")
            .with_jwt_path("/nonexistent/path")
            .with_jwt("inline-jwt");

        assert_eq!(auth.read_jwt().await.unwrap(), "inline-jwt");
    }

    #[test]
    fn test_defaults() {
        let auth = KubernetesAuth::new("app");
        assert_eq!(auth.mount, "kubernetes");
        assert_eq!(auth.jwt_path, DEFAULT_JWT_PATH);
        assert!(auth.supports_renewal());
    }
}
