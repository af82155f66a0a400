use super::{AuthMethod, AuthResponse, Credential};
use crate::client::RequestOptions;
use crate::{VaultClient, VaultError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const DEFAULT_RENEW_BEFORE: Duration = Duration::from_secs(10);
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// How long before expiry the background task renews the token.
    pub renew_before: Duration,
    /// Pause after a failed background renewal before trying again.
    pub retry_interval: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            renew_before: DEFAULT_RENEW_BEFORE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unauthenticated,
    Authenticated,
    Renewing,
}

/// Owns the live credential.
///
/// The credential is only ever replaced as a whole under the write lock,
/// so a request reads either the old token or the new one. A failed
/// renewal leaves the old credential in place.
pub struct TokenManager {
    auth_method: Option<Arc<dyn AuthMethod>>,
    credential: RwLock<Option<Credential>>,
    /// Number of renewals in flight.
    renewing: AtomicUsize,
    config: TokenManagerConfig,
}

impl TokenManager {
    pub fn new(auth_method: Option<Arc<dyn AuthMethod>>, config: TokenManagerConfig) -> Self {
        Self {
            auth_method,
            credential: RwLock::new(None),
            renewing: AtomicUsize::new(0),
            config,
        }
    }

    pub fn config(&self) -> &TokenManagerConfig {
        &self.config
    }

    pub async fn token(&self) -> Option<String> {
        self.credential.read().await.as_ref().map(|c| c.token.clone())
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    pub async fn state(&self) -> TokenState {
        if self.renewing.load(Ordering::SeqCst) > 0 {
            return TokenState::Renewing;
        }
        match *self.credential.read().await {
            Some(_) => TokenState::Authenticated,
            None => TokenState::Unauthenticated,
        }
    }

    /// Whether a 403 can be fixed by logging in again.
    pub fn can_reauthenticate(&self) -> bool {
        self.auth_method
            .as_ref()
            .is_some_and(|method| method.supports_renewal())
    }

    pub(crate) async fn install(&self, credential: Credential) {
        *self.credential.write().await = Some(credential);
    }

    /// Initial login. A manager without an auth method stays unauthenticated.
    pub async fn authenticate(&self, client: &VaultClient) -> Result<(), VaultError> {
        let Some(ref method) = self.auth_method else {
            return Ok(());
        };

        let credential = method.authenticate(client).await?;
        self.install(credential).await;
        Ok(())
    }

    /// Replace the current token with a fresh login.
    pub async fn reauthenticate(&self, client: &VaultClient) -> Result<(), VaultError> {
        let method = self
            .auth_method
            .as_ref()
            .ok_or_else(|| VaultError::InvalidConfig("no auth method configured".to_string()))?;

        let _renewing = RenewingGuard::enter(&self.renewing);
        let credential = method.authenticate(client).await?;
        self.install(credential).await;
        tracing::debug!("Re-authenticated successfully");
        Ok(())
    }

    /// Renew the token via renew-self, falling back to a fresh login.
    ///
    /// If both fail the stale credential is kept so the next request hits
    /// a 403 and tries again.
    pub async fn renew(&self, client: &VaultClient) -> Result<(), VaultError> {
        let _renewing = RenewingGuard::enter(&self.renewing);

        let renewable = self
            .credential
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.renewable);

        let renew_error = if renewable {
            match Self::renew_self(client).await {
                Ok(credential) => {
                    self.install(credential).await;
                    tracing::debug!("Token renewed successfully");
                    return Ok(());
                }
                Err(e) => e,
            }
        } else {
            VaultError::InvalidConfig("token is not renewable".to_string())
        };

        let Some(ref method) = self.auth_method else {
            return Err(VaultError::TokenRenewal(Box::new(renew_error)));
        };

        tracing::info!(error = %renew_error, "Token renewal failed, re-authenticating");
        match method.authenticate(client).await {
            Ok(credential) => {
                self.install(credential).await;
                tracing::debug!("Re-authenticated successfully");
                Ok(())
            }
            Err(e) => Err(VaultError::Reauthentication {
                renew_error: renew_error.to_string(),
                source: Box::new(e),
            }),
        }
    }

    async fn renew_self(client: &VaultClient) -> Result<Credential, VaultError> {
        let response: AuthResponse = client
            .write(
                &["v1", "auth", "token", "renew-self"],
                &serde_json::json!({ "increment": 0 }),
                Some(RequestOptions::without_renewal()),
            )
            .await?;
        Ok(response.into())
    }

    async fn next_renewal(&self) -> Option<Duration> {
        self.credential
            .read()
            .await
            .as_ref()
            .and_then(|c| c.renew_in(Instant::now(), self.config.renew_before))
    }
}

/// Counts one in-flight renewal; overlapping renewals (the background loop
/// and a 403 inside a request) each hold their own guard.
struct RenewingGuard<'a>(&'a AtomicUsize);

impl<'a> RenewingGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for RenewingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawn the background renewal loop for `client`.
///
/// The task only keeps a weak handle to the client: it ends when the last
/// `VaultClient` is dropped, when `VaultClient::shutdown` is called, or when
/// the credential does not expire. Renewal errors go to `errors` if given.
pub(crate) fn spawn_renewal_task(
    client: &VaultClient,
    errors: Option<mpsc::UnboundedSender<VaultError>>,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(&client.inner);
    let shutdown = client.inner.shutdown.clone();

    tokio::spawn(async move {
        tracing::debug!("Token renewal task started");

        loop {
            let delay = {
                let Some(inner) = weak.upgrade() else { break };
                match inner.tokens.next_renewal().await {
                    Some(delay) => delay,
                    None => {
                        tracing::debug!("Token does not expire, nothing to renew");
                        break;
                    }
                }
            };

            tracing::debug!(?delay, "Next token renewal scheduled");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }

            let Some(inner) = weak.upgrade() else { break };
            let retry_interval = inner.tokens.config.retry_interval;
            let client = VaultClient::from_inner(inner);

            let result = client.inner.tokens.renew(&client).await;
            drop(client);

            if let Err(e) = result {
                tracing::warn!(error = %e, ?retry_interval, "Background token renewal failed");
                if let Some(ref errors) = errors {
                    let _ = errors.send(e);
                }

                tokio::select! {
                    _ = tokio::time::sleep(retry_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }

        tracing::debug!("Token renewal task stopped");
    })
}
