//! vault-sdk - async client for HashiCorp Vault
//!
//! Every call goes through one request pipeline that attaches the token and,
//! when Vault rejects it (403) or the server certificate is signed by an
//! unknown authority, reloads TLS and/or logs in again, then retries once.
//!
//! Authentication:
//! 1. `auth_method(..)` on the builder → that method (Kubernetes, userpass, custom)
//! 2. `token(..)` or `VAULT_TOKEN` → static token
//! 3. `VaultClient::from_env()` with `KUBERNETES_SERVICE_HOST` → K8s auth with background renewal
//! 4. Otherwise → unauthenticated

pub mod auth;
mod client;
pub mod engines;
mod error;
mod models;
mod path;
mod tls;
mod transport;

pub use auth::{AuthMethod, KubernetesAuth, StaticTokenAuth, UserpassAuth};
pub use client::{RequestOptions, Service, VaultClient, VaultClientBuilder};
pub use error::VaultError;
pub use models::{KvData, KvMetadata, KvVersion, ListData, ListResponse};
pub use path::{escape_segment, resolve_path};
pub use tls::TlsConfig;
pub use transport::{
    DEFAULT_TIMEOUT, HttpTransport, Method, Transport, TransportError, TransportRequest,
    TransportResponse,
};
