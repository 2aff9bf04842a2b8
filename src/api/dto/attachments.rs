use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct AttachmentUploadResponse {
    pub attachment_id: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestRequest {
    pub client_id: String,
    #[serde(default)]
    pub since_version: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ManifestAction {
    Download,
    Delete,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub attachment_id: String,
    pub operation: ManifestAction,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub version: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OperationCount {
    pub download: usize,
    pub delete: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestResponse {
    pub current_version: i64,
    pub operations: Vec<ManifestEntry>,
    pub total_download_size: i64,
    pub operation_count: OperationCount,
}
