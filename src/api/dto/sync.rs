use crate::domain::observation::Observation;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SinceDto {
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub client_id: String,
    #[serde(default)]
    pub since: Option<SinceDto>,
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    pub limit: Option<i64>,
    pub page_token: Option<String>,
    /// Comma-separated form types.
    pub schema_types: Option<String>,
}

impl PullQuery {
    #[must_use]
    pub fn schema_type_list(&self) -> Vec<String> {
        self.schema_types
            .as_deref()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDto {
    pub observation_id: String,
    pub form_type: String,
    pub form_version: String,
    pub data: serde_json::Value,
    pub deleted: bool,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub synced_at: OffsetDateTime,
}

impl From<Observation> for ObservationDto {
    fn from(o: Observation) -> Self {
        Self {
            observation_id: o.observation_id,
            form_type: o.form_type,
            form_version: o.form_version,
            data: o.data,
            deleted: o.deleted,
            version: o.version,
            created_at: o.created_at,
            updated_at: o.updated_at,
            synced_at: o.synced_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullResponse {
    pub current_version: i64,
    pub records: Vec<ObservationDto>,
    pub change_cutoff: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    pub has_more: bool,
}

/// One record of a push body. `version` is the base version the client last
/// saw for this observation, used only for overwrite warnings.
#[derive(Debug, Clone, Deserialize)]
pub struct PushRecordDto {
    #[serde(default)]
    pub observation_id: String,
    #[serde(default)]
    pub form_type: String,
    #[serde(default)]
    pub form_version: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub client_id: String,
    pub transmission_id: Uuid,
    #[serde(default)]
    pub records: Vec<PushRecordDto>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<String>,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushWarning {
    pub index: usize,
    pub observation_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushResponse {
    pub current_version: i64,
    pub success_count: usize,
    pub failed_records: Vec<FailedRecord>,
    pub warnings: Vec<PushWarning>,
}
