use super::PATH_PREFIX;
use crate::client::{RequestOptions, Service};
use crate::models::{KvData, KvMetadata, KvVersion, ListResponse};
use crate::{Method, VaultClient, VaultError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const KV1_DEFAULT_MOUNT: &str = "kv";
const KV2_DEFAULT_MOUNT: &str = "secret";

/// Key/value secrets engine, version 1.
#[derive(Debug, Clone)]
pub struct Kv1 {
    service: Service,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Kv1ReadResponse<T> {
    pub data: T,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

impl Kv1 {
    pub fn new(client: VaultClient) -> Self {
        Self::with_mount(client, KV1_DEFAULT_MOUNT)
    }

    pub fn with_mount(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            service: Service::new(client, mount),
        }
    }

    pub fn mount(&self) -> &str {
        self.service.mount()
    }

    /// Store `data` under `id`, replacing what was there.
    pub async fn create<T: Serialize + ?Sized>(&self, id: &str, data: &T) -> Result<(), VaultError> {
        self.service
            .client()
            .submit(Method::Post, &[PATH_PREFIX, self.mount(), id], Some(data), None)
            .await
    }

    pub async fn read<T>(&self, id: &str) -> Result<Kv1ReadResponse<T>, VaultError>
    where
        T: DeserializeOwned,
    {
        self.service
            .client()
            .read(&[PATH_PREFIX, self.mount(), id], None)
            .await
    }

    /// Keys directly under `path`. Sub-folders end with `/`.
    pub async fn list(&self, path: &str) -> Result<Vec<String>, VaultError> {
        let response: ListResponse = self
            .service
            .client()
            .list(&[PATH_PREFIX, self.mount(), path], None)
            .await?;
        Ok(response.data.keys)
    }

    pub async fn delete(&self, id: &str) -> Result<(), VaultError> {
        self.service
            .client()
            .delete(&[PATH_PREFIX, self.mount(), id], None)
            .await
    }
}

/// Key/value secrets engine, version 2 (read side).
#[derive(Debug, Clone)]
pub struct Kv2 {
    service: Service,
}

#[derive(Deserialize)]
struct DataResponse {
    data: KvData,
}

#[derive(Deserialize)]
struct MetadataResponse {
    data: MetadataData,
}

#[derive(Deserialize)]
struct MetadataData {
    created_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    custom_metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    versions: HashMap<String, VersionInfo>,
}

#[derive(Deserialize)]
struct VersionInfo {
    created_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    deletion_time: String,
    #[serde(default)]
    destroyed: bool,
}

impl Kv2 {
    pub fn new(client: VaultClient) -> Self {
        Self::with_mount(client, KV2_DEFAULT_MOUNT)
    }

    pub fn with_mount(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            service: Service::new(client, mount),
        }
    }

    pub fn mount(&self) -> &str {
        self.service.mount()
    }

    /// Read the latest version of the secret at `path`.
    pub async fn read(&self, path: &str) -> Result<KvData, VaultError> {
        self.read_with(path, None).await
    }

    pub async fn read_version(&self, path: &str, version: u64) -> Result<KvData, VaultError> {
        self.read_with(path, Some(version)).await
    }

    async fn read_with(&self, path: &str, version: Option<u64>) -> Result<KvData, VaultError> {
        let opts = version.map(|v| RequestOptions::new().parameter("version", v.to_string()));
        let response: DataResponse = self
            .service
            .client()
            .read(&[PATH_PREFIX, self.mount(), "data", path], opts)
            .await
            .map_err(|e| not_found(e, path))?;
        Ok(response.data)
    }

    /// Read the metadata of the secret at `path`, versions sorted ascending.
    pub async fn metadata(&self, path: &str) -> Result<KvMetadata, VaultError> {
        let response: MetadataResponse = self
            .service
            .client()
            .read(&[PATH_PREFIX, self.mount(), "metadata", path], None)
            .await
            .map_err(|e| not_found(e, path))?;

        let mut versions = response
            .data
            .versions
            .into_iter()
            .map(|(version, info)| {
                Ok(KvVersion {
                    version: version
                        .parse()
                        .map_err(|_| VaultError::Decode(format!("invalid version {version:?}")))?,
                    created_time: info.created_time,
                    deletion_time: parse_deletion_time(&info.deletion_time)?,
                    destroyed: info.destroyed,
                })
            })
            .collect::<Result<Vec<_>, VaultError>>()?;

        versions.sort_by_key(|v| v.version);

        Ok(KvMetadata {
            created_time: response.data.created_time,
            custom_metadata: response.data.custom_metadata,
            versions,
        })
    }
}

fn not_found(error: VaultError, path: &str) -> VaultError {
    match error.status() {
        Some(404) => VaultError::SecretNotFound {
            path: path.to_string(),
        },
        _ => error,
    }
}

fn parse_deletion_time(
    value: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, VaultError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| VaultError::Decode(format!("invalid timestamp {value:?}: {e}")))
}

impl VaultClient {
    pub fn kv1(&self) -> Kv1 {
        Kv1::new(self.clone())
    }

    pub fn kv2(&self) -> Kv2 {
        Kv2::new(self.clone())
    }
}
