use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ObjectKey, ObjectMetadata};

/// Expected digests supplied with an upload, as `(algorithm name, hex)`
/// pairs straight from the request. Unknown names are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    pub expected_hashes: Vec<(String, String)>,
}

impl UploadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(mut self, algorithm: impl Into<String>, hex: impl Into<String>) -> Self {
        self.expected_hashes.push((algorithm.into(), hex.into()));
        self
    }
}

/// Response body of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub hash: String,
}

impl From<ObjectKey> for UploadResponse {
    fn from(key: ObjectKey) -> Self {
        Self { hash: key.into() }
    }
}

/// One entry of the statistics listing; dates are Unix epoch seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatDto {
    pub filename: String,
    pub size: u64,
    pub upload_date: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remove_date: Option<i64>,
    pub download_count: u64,
}

impl From<ObjectMetadata> for ObjectStatDto {
    fn from(meta: ObjectMetadata) -> Self {
        Self {
            filename: meta.filename,
            size: meta.size,
            upload_date: meta.upload_date.timestamp(),
            remove_date: meta.remove_date.map(|d| d.timestamp()),
            download_count: meta.download_count,
        }
    }
}
