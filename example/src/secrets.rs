use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task;
use tokio::time::interval;

use vault_sdk::engines::{TransitDecryptOptions, TransitEncryptOptions, decode_ciphertext};
use vault_sdk::{VaultClient, VaultClientBuilder, VaultError};

const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Build a client from the environment and log background renewal failures.
pub async fn setup(application_name: &str) -> Result<VaultClient, VaultError> {
    let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();

    let client = VaultClientBuilder::from_env()
        .application_name(application_name)
        .renewal_errors(errors_tx)
        .build()
        .await?;

    task::spawn(async move {
        while let Some(e) = errors_rx.recv().await {
            tracing::error!(error = %e, "Vault token renewal failed");
        }
    });

    tracing::info!(base_url = client.base_url(), "Vault client ready");
    Ok(client)
}

pub async fn transit_roundtrip(client: &VaultClient, key: &str) -> Result<(), VaultError> {
    let transit = client.transit();
    if !transit.key_exists(key).await? {
        tracing::warn!(key, "Transit key does not exist, skipping");
        return Ok(());
    }

    let encrypted = transit
        .encrypt(key, b"hello vault", &TransitEncryptOptions::default())
        .await?;
    let (_, version) = decode_ciphertext(&encrypted.ciphertext)?;
    let decrypted = transit
        .decrypt(key, &encrypted.ciphertext, &TransitDecryptOptions::default())
        .await?;

    tracing::info!(
        key,
        version,
        plaintext = %String::from_utf8_lossy(&decrypted.plaintext),
        "Transit roundtrip"
    );
    Ok(())
}

/// Re-read `path` periodically until Ctrl-C, so token renewal can be observed.
pub async fn watch(client: VaultClient, path: String) {
    let mut ticker = interval(REFRESH_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        match client.kv2().read(&path).await {
            Ok(secret) => tracing::info!(path = %path, version = secret.metadata.version, "Secret refreshed"),
            Err(e) => tracing::error!(path = %path, error = %e, "Error when refreshing secret"),
        }
    }

    client.shutdown();
    tracing::info!("Stopped");
}
