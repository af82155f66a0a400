use crate::VaultError;
use crate::tls::TlsConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use rustls::CertificateError;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP verbs understood by Vault. `List` goes out as the literal `LIST` verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    List,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::List => "LIST",
        }
    }

    fn to_reqwest(self) -> Result<reqwest::Method, TransportError> {
        reqwest::Method::from_bytes(self.as_str().as_bytes())
            .map_err(|e| TransportError::Other(format!("invalid method {}: {}", self, e)))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request as handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully read response. The body is owned, so nothing stays open once
/// the response is dropped.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The server certificate chains to an authority missing from the
    /// trust store, usually because the CA was rotated.
    #[error("certificate signed by unknown authority: {0}")]
    UnknownAuthority(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_unknown_authority(&self) -> bool {
        matches!(self, TransportError::UnknownAuthority(_))
    }
}

/// Performs HTTP round trips for the client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Rebuild the trust store from `tls`. Called once at construction and
    /// again whenever a request fails with an unknown authority.
    fn configure_tls(&self, tls: &TlsConfig) -> Result<(), VaultError>;
}

/// [`Transport`] backed by `reqwest` with rustls.
pub struct HttpTransport {
    client: RwLock<reqwest::Client>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, VaultError> {
        Ok(Self {
            client: RwLock::new(build_client(timeout, None)?),
            timeout,
        })
    }

    fn current(&self) -> reqwest::Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn build_client(timeout: Duration, tls: Option<&TlsConfig>) -> Result<reqwest::Client, VaultError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout);

    if let Some(tls) = tls {
        for cert in tls.load_certificates()? {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|e| VaultError::Tls(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .current()
            .request(request.method.to_reqwest()?, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn configure_tls(&self, tls: &TlsConfig) -> Result<(), VaultError> {
        let client = build_client(self.timeout, Some(tls))?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
        tracing::debug!(?tls, "TLS trust store reloaded");
        Ok(())
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err).join(": ");
    if has_unknown_issuer(&err) {
        TransportError::UnknownAuthority(message)
    } else {
        TransportError::Other(message)
    }
}

fn error_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        messages.push(e.to_string());
        current = e.source();
    }
    messages
}

/// Whether rustls rejected the peer chain as signed by an unknown issuer.
///
/// `io::Error::source` skips the wrapped error, so io errors are unwrapped
/// with `get_ref` as well.
fn has_unknown_issuer(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer)) =
            e.downcast_ref::<rustls::Error>()
        {
            return true;
        }
        if let Some(inner) = e.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            if has_unknown_issuer(inner) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_strings() {
        assert_eq!(Method::List.as_str(), "LIST");
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(Method::List.to_reqwest().unwrap().as_str(), "LIST");
    }

    #[derive(Debug)]
    struct Connect(io::Error);

    impl fmt::Display for Connect {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("client error (Connect)")
        }
    }

    impl StdError for Connect {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    fn tls_failure(cert: CertificateError) -> Connect {
        Connect(io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(cert),
        ))
    }

    #[test]
    fn test_unknown_issuer_detected_through_io_error() {
        assert!(has_unknown_issuer(&tls_failure(CertificateError::UnknownIssuer)));
        assert!(has_unknown_issuer(&rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer
        )));
    }

    #[test]
    fn test_other_certificate_errors_are_not_unknown_issuer() {
        assert!(!has_unknown_issuer(&tls_failure(CertificateError::Expired)));
        assert!(!has_unknown_issuer(&tls_failure(CertificateError::NotValidForName)));
    }

    #[test]
    fn test_unknown_issuer_wording_alone_is_not_enough() {
        let err = Connect(io::Error::other(
            "invalid peer certificate: UnknownIssuer (from upstream proxy)",
        ));
        assert!(!has_unknown_issuer(&err));
        assert_eq!(
            error_chain(&err),
            vec![
                "client error (Connect)".to_string(),
                "invalid peer certificate: UnknownIssuer (from upstream proxy)".to_string(),
            ]
        );
    }

    #[test]
    fn test_request_header_lookup_is_case_insensitive() {
        let request = TransportRequest {
            method: Method::Get,
            url: "http://vault:8200/v1/kv/a".to_string(),
            headers: vec![("X-Vault-Token".to_string(), "abc".to_string())],
            query: Vec::new(),
            body: None,
        };
        assert_eq!(request.header("x-vault-token"), Some("abc"));
        assert_eq!(request.header("user-agent"), None);
    }

    #[test]
    fn test_response_success_range() {
        assert!(TransportResponse::new(204, Vec::new()).is_success());
        assert!(!TransportResponse::new(403, Vec::new()).is_success());
        assert!(!TransportResponse::new(301, Vec::new()).is_success());
    }

    #[tokio::test]
    async fn test_connection_refused_is_not_unknown_authority() {
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let err = transport
            .send(TransportRequest {
                method: Method::Get,
                url: "http://127.0.0.1:1/v1/sys/health".to_string(),
                headers: Vec::new(),
                query: Vec::new(),
                body: None,
            })
            .await
            .unwrap_err();
        assert!(!err.is_unknown_authority());
    }
}
