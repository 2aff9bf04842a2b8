use crate::domain::observation::Observation;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, FromRow)]
pub struct ObservationRecord {
    pub observation_id: String,
    pub form_type: String,
    pub form_version: String,
    pub data: serde_json::Value,
    pub deleted: bool,
    pub version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub synced_at: OffsetDateTime,
}

impl From<ObservationRecord> for Observation {
    fn from(r: ObservationRecord) -> Self {
        Self {
            observation_id: r.observation_id,
            form_type: r.form_type,
            form_version: r.form_version,
            data: r.data,
            deleted: r.deleted,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
            synced_at: r.synced_at,
        }
    }
}
