use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// KV v2 secret data with version metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvData {
    pub data: HashMap<String, serde_json::Value>,
    pub metadata: KvVersion,
}

/// Version information for a secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvVersion {
    #[serde(default)]
    pub version: u64,
    pub created_time: DateTime<Utc>,
    /// Vault sends `""` for versions that were never deleted.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub deletion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub destroyed: bool,
}

/// Full metadata for a secret including all versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvMetadata {
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub custom_metadata: Option<HashMap<String, String>>,
    pub versions: Vec<KvVersion>,
}

/// Response to LIST calls: `{"data": {"keys": [...]}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub data: ListData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub keys: Vec<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
