mod credential;
mod kubernetes;
mod manager;
mod token;
mod userpass;

pub use credential::{AuthInfo, AuthResponse, Credential, MIN_RENEW_DELAY};
pub use kubernetes::KubernetesAuth;
pub use manager::{TokenManager, TokenManagerConfig, TokenState};
pub(crate) use manager::spawn_renewal_task;
pub use token::StaticTokenAuth;
pub use userpass::UserpassAuth;

use crate::{VaultClient, VaultError};
use async_trait::async_trait;

/// Trait for authentication methods
#[async_trait]
pub trait AuthMethod: Send + Sync {
    /// Log in and return a fresh credential.
    ///
    /// Login requests must be sent with renewal disabled, otherwise a
    /// rejected login would trigger another login.
    async fn authenticate(&self, client: &VaultClient) -> Result<Credential, VaultError>;

    /// Whether a rejected token can be replaced by authenticating again
    fn supports_renewal(&self) -> bool;
}
