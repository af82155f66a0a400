#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vault_sdk::auth::Credential;
use vault_sdk::{
    AuthMethod, TlsConfig, Transport, TransportError, TransportRequest, TransportResponse,
    VaultClient, VaultError,
};

pub const BASE_URL: &str = "http://vault.test";

type Handler =
    dyn Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError> + Send + Sync;

/// In-memory transport. Every request is recorded and answered by `handler`,
/// which also gets the number of requests sent before this one.
pub struct StubTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<TransportRequest>>,
    tls_reloads: AtomicUsize,
    /// `configure_tls` fails once it has been called this many times.
    tls_fails_after: Option<usize>,
}

impl StubTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            tls_reloads: AtomicUsize::new(0),
            tls_fails_after: None,
        })
    }

    pub fn failing_tls_reload<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            tls_reloads: AtomicUsize::new(0),
            tls_fails_after: Some(1),
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests whose URL ends with `suffix`.
    pub fn sent_to(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }

    pub fn tls_reloads(&self) -> usize {
        self.tls_reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.handler)(&request, index)
    }

    fn configure_tls(&self, _tls: &TlsConfig) -> Result<(), VaultError> {
        let calls = self.tls_reloads.fetch_add(1, Ordering::SeqCst);
        match self.tls_fails_after {
            Some(limit) if calls >= limit => Err(VaultError::Tls("CA bundle unreadable".to_string())),
            _ => Ok(()),
        }
    }
}

/// Auth method that hands out `token-1`, `token-2`, ... without touching
/// the network.
pub struct CountingAuth {
    calls: Arc<AtomicUsize>,
    lease: Duration,
    renewable: bool,
    /// Logins after this many successful ones fail.
    fail_after: Option<usize>,
}

impl CountingAuth {
    pub fn new(lease: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            lease,
            renewable: true,
            fail_after: None,
        }
    }

    pub fn non_renewable(mut self) -> Self {
        self.renewable = false;
        self
    }

    pub fn failing_after(mut self, successes: usize) -> Self {
        self.fail_after = Some(successes);
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl AuthMethod for CountingAuth {
    async fn authenticate(&self, _client: &VaultClient) -> Result<Credential, VaultError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after.is_some_and(|limit| n > limit) {
            return Err(VaultError::Api {
                status: 400,
                errors: vec!["invalid role".to_string()],
            });
        }
        Ok(Credential::new(format!("token-{n}"), self.lease, self.renewable))
    }

    fn supports_renewal(&self) -> bool {
        true
    }
}

pub fn ok_json(value: serde_json::Value) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(200, value.to_string()))
}

pub fn status(code: u16) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(
        code,
        serde_json::json!({ "errors": ["permission denied"] }).to_string(),
    ))
}

pub fn renew_self_response(token: &str, lease_secs: u64) -> Result<TransportResponse, TransportError> {
    ok_json(serde_json::json!({
        "auth": {
            "client_token": token,
            "accessor": "accessor",
            "policies": ["default"],
            "lease_duration": lease_secs,
            "renewable": true
        }
    }))
}
