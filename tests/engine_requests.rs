mod common;

use common::{BASE_URL, StubTransport, ok_json};
use std::sync::Arc;
use vault_sdk::engines::{TransitEncryptOptions, TransitUpdateOptions};
use vault_sdk::{Method, VaultClient};

async fn stub_client(transport: Arc<StubTransport>) -> VaultClient {
    VaultClient::builder()
        .base_url(BASE_URL)
        .token("test-token")
        .transport(transport)
        .build()
        .await
        .unwrap()
}

fn key_config_response() -> serde_json::Value {
    serde_json::json!({
        "request_id": "r-1",
        "data": {
            "name": "orders",
            "type": "aes256-gcm96",
            "latest_version": 2,
            "deletion_allowed": true
        }
    })
}

#[tokio::test]
async fn test_writes_ignore_json_response_body() {
    let transport = StubTransport::new(|_, _| ok_json(key_config_response()));
    let client = stub_client(transport.clone()).await;

    client.transit().rotate("orders").await.unwrap();
    client
        .transit()
        .update("orders", &TransitUpdateOptions::default())
        .await
        .unwrap();
    client
        .kv1()
        .create("app/db", &serde_json::json!({ "user": "admin" }))
        .await
        .unwrap();

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            format!("{BASE_URL}/v1/transit/keys/orders/rotate"),
            format!("{BASE_URL}/v1/transit/keys/orders/config"),
            format!("{BASE_URL}/v1/kv/app/db"),
        ]
    );
}

#[tokio::test]
async fn test_delete_ignores_json_response_body() {
    let transport = StubTransport::new(|_, _| ok_json(serde_json::json!({ "warnings": ["gone"] })));
    let client = stub_client(transport.clone()).await;

    client.transit().force_delete("orders").await.unwrap();
    client.kv1().delete("app/db").await.unwrap();

    assert_eq!(transport.sent(), 3);
}

#[tokio::test]
async fn test_transit_key_name_stays_one_segment() {
    let transport = StubTransport::new(|_, _| ok_json(key_config_response()));
    let client = stub_client(transport.clone()).await;

    client.transit().delete("prod#staging ?x").await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Delete);
    assert_eq!(
        requests[0].url,
        format!("{BASE_URL}/v1/transit/keys/prod%23staging%20%3Fx")
    );
    assert!(requests[0].query.is_empty());
}

#[tokio::test]
async fn test_transit_key_name_escaped_on_every_path() {
    let transport = StubTransport::new(|req, _| {
        if req.url.contains("/encrypt/") {
            ok_json(serde_json::json!({
                "data": { "ciphertext": "vault:v1:abc", "key_version": 1 }
            }))
        } else {
            ok_json(key_config_response())
        }
    });
    let client = stub_client(transport.clone()).await;

    client.transit().force_delete("a/b c").await.unwrap();
    client
        .transit()
        .encrypt("a/b c", b"secret", &TransitEncryptOptions::default())
        .await
        .unwrap();

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            format!("{BASE_URL}/v1/transit/keys/a%2Fb%20c/config"),
            format!("{BASE_URL}/v1/transit/keys/a%2Fb%20c"),
            format!("{BASE_URL}/v1/transit/encrypt/a%2Fb%20c"),
        ]
    );
}
