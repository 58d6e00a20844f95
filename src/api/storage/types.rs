//! # Storage API data types

use serde::{Deserialize, Serialize};

/// An object resource. Numeric fields arrive as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub bucket: Option<String>,
    pub size: Option<String>,
    pub updated: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    #[serde(rename = "storageClass")]
    pub storage_class: Option<String>,
    /// Base64 of the MD5 digest, used to verify downloads.
    #[serde(rename = "md5Hash")]
    pub md5_hash: Option<String>,
    pub crc32c: Option<String>,
    pub generation: Option<String>,
    pub metageneration: Option<String>,
    pub etag: Option<String>,
}

impl Object {
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
pub struct ObjectListResponse {
    #[serde(default)]
    pub items: Vec<Object>,
    /// "Directories" under the listed prefix when a delimiter is used.
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub location: Option<String>,
    #[serde(rename = "storageClass")]
    pub storage_class: Option<String>,
    #[serde(rename = "timeCreated")]
    pub time_created: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BucketListResponse {
    #[serde(default)]
    pub items: Vec<Bucket>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Request body for bucket creation.
#[derive(Debug, Serialize)]
pub struct BucketRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "storageClass", skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}
