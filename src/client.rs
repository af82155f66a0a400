use crate::auth::{
    AuthMethod, KubernetesAuth, StaticTokenAuth, TokenManager, TokenManagerConfig, UserpassAuth,
    spawn_renewal_task,
};
use crate::error::VaultError;
use crate::path::resolve_path;
use crate::tls::TlsConfig;
use crate::transport::{
    DEFAULT_TIMEOUT, HttpTransport, Method, Transport, TransportError, TransportRequest,
    TransportResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEFAULT_K8S_AUTH_METHOD: &str = "kubernetes";
const DEFAULT_ROLE: &str = "app";
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query string parameters.
    pub parameters: Vec<(String, String)>,
    /// Do not renew the token and retry when the request is rejected.
    /// Login requests set this so a failed login cannot trigger another login.
    pub skip_renewal: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_renewal() -> Self {
        Self {
            skip_renewal: true,
            ..Self::default()
        }
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }
}

pub struct VaultClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    auth_method: Option<Arc<dyn AuthMethod>>,
    tls: Option<TlsConfig>,
    application_name: Option<String>,
    timeout: Duration,
    auto_renew: bool,
    renewal_errors: Option<mpsc::UnboundedSender<VaultError>>,
    token_config: TokenManagerConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            auth_method: None,
            tls: None,
            application_name: None,
            timeout: DEFAULT_TIMEOUT,
            auto_renew: false,
            renewal_errors: None,
            token_config: TokenManagerConfig::default(),
            transport: None,
        }
    }

    /// Builder preset from the environment.
    ///
    /// Auto-detects authentication method:
    /// 1. VAULT_TOKEN → static token
    /// 2. KUBERNETES_SERVICE_HOST → K8s auth with background renewal
    /// 3. Otherwise → unauthenticated
    pub fn from_env() -> Self {
        let builder = Self::new();
        if std::env::var("VAULT_TOKEN").is_ok() || std::env::var("KUBERNETES_SERVICE_HOST").is_err() {
            return builder;
        }

        let mount = std::env::var("VAULT_AUTH_METHOD")
            .unwrap_or_else(|_| DEFAULT_K8S_AUTH_METHOD.to_string());
        let role = std::env::var("VAULT_ROLE").unwrap_or_else(|_| DEFAULT_ROLE.to_string());
        let mut auth = KubernetesAuth::new(role).with_mount(mount);
        if let Ok(path) = std::env::var("K8S_JWT_TOKEN_PATH") {
            auth = auth.with_jwt_path(path);
        }

        builder.auth_method(auth).auto_renew(true)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Log in with `method`. Takes precedence over a static token.
    pub fn auth_method(self, method: impl AuthMethod + 'static) -> Self {
        self.shared_auth_method(Arc::new(method))
    }

    pub fn shared_auth_method(mut self, method: Arc<dyn AuthMethod>) -> Self {
        self.auth_method = Some(method);
        self
    }

    /// Log in through the Kubernetes auth method mounted at `kubernetes`.
    pub fn kubernetes_auth(self, role: impl Into<String>) -> Self {
        self.auth_method(KubernetesAuth::new(role))
    }

    /// Log in through the userpass auth method mounted at `userpass`.
    pub fn userpass_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_method(UserpassAuth::new(username, password))
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn ca_cert(self, path: impl Into<std::path::PathBuf>) -> Self {
        self.tls(TlsConfig::ca_cert(path))
    }

    pub fn ca_path(self, path: impl Into<std::path::PathBuf>) -> Self {
        self.tls(TlsConfig::ca_path(path))
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Renew the token in the background shortly before it expires.
    pub fn auto_renew(mut self, enabled: bool) -> Self {
        self.auto_renew = enabled;
        self
    }

    /// Where background renewal failures are reported. Without a sink they
    /// are only logged.
    pub fn renewal_errors(mut self, errors: mpsc::UnboundedSender<VaultError>) -> Self {
        self.renewal_errors = Some(errors);
        self
    }

    pub fn renew_before(mut self, duration: Duration) -> Self {
        self.token_config.renew_before = duration;
        self
    }

    pub fn retry_interval(mut self, duration: Duration) -> Self {
        self.token_config.retry_interval = duration;
        self
    }

    /// Replace the HTTP transport, e.g. with an in-memory one in tests.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    fn resolve_config(self) -> Result<ResolvedConfig, VaultError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("VAULT_ADDR").ok())
            .ok_or(VaultError::VaultNotDetected)?;

        if base_url.trim().is_empty() {
            return Err(VaultError::InvalidConfig("empty Vault address".to_string()));
        }

        let auth_method = self.auth_method.or_else(|| {
            self.token
                .or_else(|| std::env::var("VAULT_TOKEN").ok())
                .map(|token| Arc::new(StaticTokenAuth::new(token)) as Arc<dyn AuthMethod>)
        });

        Ok(ResolvedConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_method,
            tls: self.tls.or_else(TlsConfig::from_env),
            application_name: self.application_name,
            timeout: self.timeout,
            auto_renew: self.auto_renew,
            renewal_errors: self.renewal_errors,
            token_config: self.token_config,
            transport: self.transport,
        })
    }

    pub async fn build(self) -> Result<VaultClient, VaultError> {
        let config = self.resolve_config()?;

        let transport: Arc<dyn Transport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.timeout)?),
        };

        if let Some(ref tls) = config.tls {
            transport.configure_tls(tls)?;
        }

        let client = VaultClient {
            inner: Arc::new(ClientInner {
                base_url: config.base_url,
                transport,
                tls: config.tls,
                tokens: TokenManager::new(config.auth_method, config.token_config),
                application_name: config.application_name,
                shutdown: CancellationToken::new(),
            }),
        };

        client.inner.tokens.authenticate(&client).await?;

        if config.auto_renew {
            spawn_renewal_task(&client, config.renewal_errors);
        }

        Ok(client)
    }
}

struct ResolvedConfig {
    base_url: String,
    auth_method: Option<Arc<dyn AuthMethod>>,
    tls: Option<TlsConfig>,
    application_name: Option<String>,
    timeout: Duration,
    auto_renew: bool,
    renewal_errors: Option<mpsc::UnboundedSender<VaultError>>,
    token_config: TokenManagerConfig,
    transport: Option<Arc<dyn Transport>>,
}

pub(crate) struct ClientInner {
    base_url: String,
    transport: Arc<dyn Transport>,
    tls: Option<TlsConfig>,
    pub(crate) tokens: TokenManager,
    application_name: Option<String>,
    pub(crate) shutdown: CancellationToken,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Handle to a Vault server. Cloning is cheap and clones share the token.
#[derive(Clone)]
pub struct VaultClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.inner.base_url)
            .field("tls", &self.inner.tls)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    pub async fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::from_env().build().await
    }

    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Current token, if authenticated.
    pub async fn token(&self) -> Option<String> {
        self.inner.tokens.token().await
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// Stop background token renewal. Requests keep working with the
    /// current token.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Send a request and return the raw response body.
    ///
    /// A 403 (when the auth method can log in again) or an unknown
    /// certificate authority triggers one TLS reload and/or re-login,
    /// followed by exactly one retry with renewal disabled.
    pub async fn execute<B>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&B>,
        opts: Option<RequestOptions>,
    ) -> Result<Vec<u8>, VaultError>
    where
        B: Serialize + ?Sized,
    {
        let mut opts = opts.unwrap_or_default();
        let path = resolve_path(path);
        let url = format!("{}/{}", self.inner.base_url, path);
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(VaultError::Serialization)?;

        loop {
            let request = self.build_request(method, &url, &opts, body.clone()).await;
            let result = self.inner.transport.send(request).await;

            let token_rejected = matches!(&result, Ok(response) if response.status == 403)
                && self.inner.tokens.can_reauthenticate();
            let unknown_authority = matches!(&result, Err(e) if e.is_unknown_authority());

            if (token_rejected || unknown_authority) && !opts.skip_renewal {
                let cause = describe(&result);
                drop(result);

                tracing::warn!(%method, %path, %cause, "Request rejected, renewing and retrying");
                self.recover(&cause).await?;

                opts.skip_renewal = true;
                continue;
            }

            let response = result?;
            if !response.is_success() {
                return Err(VaultError::from_response(response.status, &response.body));
            }

            return Ok(response.body);
        }
    }

    /// Send a request and deserialize the response body into `R`.
    ///
    /// An empty body deserializes like JSON `null`, so `()` and `Option<_>`
    /// work for endpoints answering 204.
    pub async fn request<B, R>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&B>,
        opts: Option<RequestOptions>,
    ) -> Result<R, VaultError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = self.execute(method, path, body, opts).await?;
        parse_body(&body)
    }

    pub async fn read<R: DeserializeOwned>(
        &self,
        path: &[&str],
        opts: Option<RequestOptions>,
    ) -> Result<R, VaultError> {
        self.request(Method::Get, path, None::<&()>, opts).await
    }

    pub async fn write<B, R>(
        &self,
        path: &[&str],
        body: &B,
        opts: Option<RequestOptions>,
    ) -> Result<R, VaultError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::Post, path, Some(body), opts).await
    }

    pub async fn put<B, R>(
        &self,
        path: &[&str],
        body: &B,
        opts: Option<RequestOptions>,
    ) -> Result<R, VaultError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::Put, path, Some(body), opts).await
    }

    /// Send a request whose response body is not needed. Whatever a
    /// successful response carries is dropped unparsed.
    pub async fn submit<B>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&B>,
        opts: Option<RequestOptions>,
    ) -> Result<(), VaultError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(method, path, body, opts).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &[&str], opts: Option<RequestOptions>) -> Result<(), VaultError> {
        self.submit(Method::Delete, path, None::<&()>, opts).await
    }

    pub async fn list<R: DeserializeOwned>(
        &self,
        path: &[&str],
        opts: Option<RequestOptions>,
    ) -> Result<R, VaultError> {
        self.request(Method::List, path, None::<&()>, opts).await
    }

    async fn build_request(
        &self,
        method: Method,
        url: &str,
        opts: &RequestOptions,
        body: Option<Vec<u8>>,
    ) -> TransportRequest {
        let mut headers = Vec::new();

        if let Some(token) = self.inner.tokens.token().await.filter(|t| !t.is_empty()) {
            headers.push((TOKEN_HEADER.to_string(), token));
        }

        if let Some(ref app_name) = self.inner.application_name {
            headers.push(("User-Agent".to_string(), app_name.clone()));
        }

        TransportRequest {
            method,
            url: url.to_string(),
            headers,
            query: opts.parameters.clone(),
            body,
        }
    }

    async fn recover(&self, cause: &str) -> Result<(), VaultError> {
        if let Some(ref tls) = self.inner.tls {
            self.inner
                .transport
                .configure_tls(tls)
                .map_err(|e| VaultError::TlsReload {
                    cause: cause.to_string(),
                    source: Box::new(e),
                })?;
        }

        if self.inner.tokens.can_reauthenticate() {
            self.inner
                .tokens
                .reauthenticate(self)
                .await
                .map_err(|e| VaultError::TokenRenewal(Box::new(e)))?;
        }

        Ok(())
    }
}

fn describe(result: &Result<TransportResponse, TransportError>) -> String {
    match result {
        Ok(response) => format!("status {}", response.status),
        Err(e) => e.to_string(),
    }
}

fn parse_body<R: DeserializeOwned>(body: &[u8]) -> Result<R, VaultError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(serde_json::Value::Null).map_err(VaultError::Deserialization);
    }
    serde_json::from_slice(body).map_err(VaultError::Deserialization)
}

/// A client bound to the mount point of an engine or auth method.
#[derive(Debug, Clone)]
pub struct Service {
    client: VaultClient,
    mount: String,
}

impl Service {
    pub fn new(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            client,
            mount: mount.into(),
        }
    }

    pub fn client(&self) -> &VaultClient {
        &self.client
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }
}
