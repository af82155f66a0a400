use super::PATH_PREFIX;
use crate::client::Service;
use crate::models::ListResponse;
use crate::path::escape_segment;
use crate::{Method, VaultClient, VaultError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_MOUNT: &str = "transit";
const KEY_NOT_FOUND: &str = "encryption key not found";
const CIPHERTEXT_PREFIX: &str = "vault:v";

/// Transit secrets engine: encryption as a service.
#[derive(Debug, Clone)]
pub struct Transit {
    service: Service,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitCreateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergent_encryption: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exportable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_plaintext_backup: Option<bool>,
    /// Key type, e.g. `aes256-gcm96` (server default) or `rsa-4096`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitUpdateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_decryption_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_encryption_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exportable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_plaintext_backup: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitReadResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub keys: HashMap<u32, serde_json::Value>,
    #[serde(default)]
    pub min_decryption_version: u32,
    #[serde(default)]
    pub min_encryption_version: u32,
    #[serde(default)]
    pub latest_version: u32,
    #[serde(default)]
    pub deletion_allowed: bool,
    #[serde(default)]
    pub derived: bool,
    #[serde(default)]
    pub exportable: bool,
    #[serde(default)]
    pub allow_plaintext_backup: bool,
    #[serde(default)]
    pub supports_encryption: bool,
    #[serde(default)]
    pub supports_decryption: bool,
    #[serde(default)]
    pub supports_derivation: bool,
    #[serde(default)]
    pub supports_signing: bool,
}

#[derive(Debug, Clone)]
pub struct TransitExportOptions {
    /// `encryption-key`, `signing-key` or `hmac-key`.
    pub key_type: String,
    /// A specific version, `latest`, or all versions when `None`.
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitExportResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub keys: HashMap<u32, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitEncryptOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergent_encryption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitEncryptResponse {
    pub ciphertext: String,
    #[serde(default)]
    pub key_version: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitDecryptOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransitDecryptResponse {
    /// Decoded plaintext bytes.
    pub plaintext: Vec<u8>,
}

#[derive(Serialize)]
struct EncryptRequest<'a> {
    plaintext: String,
    #[serde(flatten)]
    options: &'a TransitEncryptOptions,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
    #[serde(flatten)]
    options: &'a TransitDecryptOptions,
}

#[derive(Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Deserialize)]
struct PlaintextData {
    plaintext: String,
}

impl Transit {
    pub fn new(client: VaultClient) -> Self {
        Self::with_mount(client, DEFAULT_MOUNT)
    }

    pub fn with_mount(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            service: Service::new(client, mount),
        }
    }

    pub fn mount(&self) -> &str {
        self.service.mount()
    }

    fn client(&self) -> &VaultClient {
        self.service.client()
    }

    pub async fn create(&self, key: &str, opts: &TransitCreateOptions) -> Result<(), VaultError> {
        let key = escape_segment(key);
        self.client()
            .submit(
                Method::Post,
                &[PATH_PREFIX, self.mount(), "keys", key.as_str()],
                Some(opts),
                None,
            )
            .await
    }

    pub async fn read(&self, key: &str) -> Result<TransitReadResponse, VaultError> {
        let key = escape_segment(key);
        let response: DataResponse<TransitReadResponse> = self
            .client()
            .read(&[PATH_PREFIX, self.mount(), "keys", key.as_str()], None)
            .await?;
        Ok(response.data)
    }

    pub async fn list(&self) -> Result<Vec<String>, VaultError> {
        let response: ListResponse = self
            .client()
            .list(&[PATH_PREFIX, self.mount(), "keys"], None)
            .await?;
        Ok(response.data.keys)
    }

    pub async fn update(&self, key: &str, opts: &TransitUpdateOptions) -> Result<(), VaultError> {
        let key = escape_segment(key);
        self.client()
            .submit(
                Method::Post,
                &[PATH_PREFIX, self.mount(), "keys", key.as_str(), "config"],
                Some(opts),
                None,
            )
            .await
    }

    pub async fn rotate(&self, key: &str) -> Result<(), VaultError> {
        let key = escape_segment(key);
        self.client()
            .submit(
                Method::Post,
                &[PATH_PREFIX, self.mount(), "keys", key.as_str(), "rotate"],
                None::<&()>,
                None,
            )
            .await
    }

    /// Delete `key`. Vault refuses unless deletion was allowed beforehand;
    /// see [`Transit::force_delete`].
    pub async fn delete(&self, key: &str) -> Result<(), VaultError> {
        let key = escape_segment(key);
        self.client()
            .delete(&[PATH_PREFIX, self.mount(), "keys", key.as_str()], None)
            .await
    }

    /// Allow deletion of `key`, then delete it.
    pub async fn force_delete(&self, key: &str) -> Result<(), VaultError> {
        let allow = TransitUpdateOptions {
            deletion_allowed: Some(true),
            ..Default::default()
        };
        self.update(key, &allow).await?;
        self.delete(key).await
    }

    pub async fn key_exists(&self, key: &str) -> Result<bool, VaultError> {
        let keys = match self.list().await {
            Ok(keys) => keys,
            // Listing an empty mount answers 404.
            Err(e) if e.status() == Some(404) => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(keys.iter().any(|k| k == key))
    }

    pub async fn export(
        &self,
        key: &str,
        opts: &TransitExportOptions,
    ) -> Result<TransitExportResponse, VaultError> {
        let key = escape_segment(key);
        let mut path = vec![
            PATH_PREFIX,
            self.mount(),
            "export",
            opts.key_type.as_str(),
            key.as_str(),
        ];
        if let Some(ref version) = opts.version {
            path.push(version.as_str());
        }

        let response: DataResponse<TransitExportResponse> = self.client().read(&path, None).await?;
        Ok(response.data)
    }

    /// Encrypt `plaintext` with `key`. The plaintext is base64-encoded here.
    pub async fn encrypt(
        &self,
        key: &str,
        plaintext: &[u8],
        opts: &TransitEncryptOptions,
    ) -> Result<TransitEncryptResponse, VaultError> {
        let key = escape_segment(key);
        let body = EncryptRequest {
            plaintext: STANDARD.encode(plaintext),
            options: opts,
        };
        let response: DataResponse<TransitEncryptResponse> = self
            .client()
            .write(&[PATH_PREFIX, self.mount(), "encrypt", key.as_str()], &body, None)
            .await?;
        Ok(response.data)
    }

    /// Decrypt a `vault:v<N>:` ciphertext with `key`.
    pub async fn decrypt(
        &self,
        key: &str,
        ciphertext: &str,
        opts: &TransitDecryptOptions,
    ) -> Result<TransitDecryptResponse, VaultError> {
        let key = escape_segment(key);
        let body = DecryptRequest {
            ciphertext,
            options: opts,
        };
        let response: DataResponse<PlaintextData> = self
            .client()
            .write(&[PATH_PREFIX, self.mount(), "decrypt", key.as_str()], &body, None)
            .await
            .map_err(map_key_not_found)?;

        let plaintext = STANDARD
            .decode(response.data.plaintext)
            .map_err(|e| VaultError::Decode(format!("plaintext is not base64: {e}")))?;
        Ok(TransitDecryptResponse { plaintext })
    }
}

fn map_key_not_found(error: VaultError) -> VaultError {
    if error.status() == Some(400) && matches!(error.errors(), [only] if only == KEY_NOT_FOUND) {
        return VaultError::EncryptionKeyNotFound;
    }
    error
}

/// Split `vault:v<N>:<payload>` into the payload and the key version.
pub fn decode_ciphertext(ciphertext: &str) -> Result<(&str, u32), VaultError> {
    let invalid = || VaultError::Decode("invalid vault ciphertext format".to_string());

    let rest = ciphertext.strip_prefix(CIPHERTEXT_PREFIX).ok_or_else(invalid)?;
    let (version, payload) = rest.split_once(':').ok_or_else(invalid)?;

    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) || payload.is_empty() {
        return Err(invalid());
    }

    let version = version
        .parse()
        .map_err(|_| VaultError::Decode("can't parse key version".to_string()))?;
    Ok((payload, version))
}

/// Inverse of [`decode_ciphertext`].
pub fn encode_ciphertext(payload: &str, key_version: u32) -> String {
    format!("{CIPHERTEXT_PREFIX}{key_version}:{payload}")
}

impl VaultClient {
    pub fn transit(&self) -> Transit {
        Transit::new(self.clone())
    }
}
