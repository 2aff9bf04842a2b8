use time::OffsetDateTime;

/// One form submission. Rows are never physically removed; deletion is a
/// mutation that flips `deleted` and assigns a fresh version, so clients at
/// older cursors still observe the event.
#[derive(Debug, Clone)]
pub struct Observation {
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

/// Write payload for an accepted push record.
#[derive(Debug, Clone)]
pub struct ObservationWrite<'a> {
    pub observation_id: &'a str,
    pub form_type: &'a str,
    pub form_version: &'a str,
    pub data: &'a serde_json::Value,
    pub deleted: bool,
}
