use crate::adapters::database::observation_repo::ObservationRepository;
use crate::adapters::database::transmission_repo::TransmissionRepository;
use crate::adapters::database::{DbPool, current_sync_version, set_repeatable_read};
use crate::api::dto::sync::{
    FailedRecord, ObservationDto, PullResponse, PushRecordDto, PushRequest, PushResponse, PushWarning,
};
use crate::domain::observation::ObservationWrite;
use crate::domain::page_token::PageToken;
use crate::error::{AppError, Result};

const DEFAULT_PULL_LIMIT: i64 = 50;
const MAX_PULL_LIMIT: i64 = 500;

fn is_unique_violation(e: &AppError) -> bool {
    matches!(
        e,
        AppError::Database(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505")
    )
}

/// Inputs for one pull call, after HTTP decoding.
#[derive(Debug)]
pub struct PullParams {
    pub client_id: String,
    pub since_version: i64,
    pub schema_types: Vec<String>,
    pub limit: Option<i64>,
    pub page_token: Option<String>,
}

/// Outcome of a push: freshly computed, or a replay of a previously stored
/// response. Both carry the exact serialized body so a retry is byte-equal.
#[derive(Debug)]
pub struct PushReply {
    pub body: Vec<u8>,
    pub replayed: bool,
}

#[derive(Clone, Debug)]
pub struct SyncService {
    pool: DbPool,
    observations: ObservationRepository,
    transmissions: TransmissionRepository,
    max_record_bytes: usize,
    retention_hours: i64,
}

impl SyncService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        observations: ObservationRepository,
        transmissions: TransmissionRepository,
        max_record_bytes: usize,
        retention_hours: i64,
    ) -> Self {
        Self { pool, observations, transmissions, max_record_bytes, retention_hours }
    }

    /// Cursor-based pull. Runs as one REPEATABLE READ transaction so the
    /// returned page is a consistent snapshot: every record with
    /// `version <= current_version` is visible and nothing newer leaks in.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, params),
        fields(client_id = %params.client_id, since = params.since_version)
    )]
    pub async fn pull(&self, params: PullParams) -> Result<PullResponse> {
        let filter_digest = PageToken::filter_digest(&params.schema_types);

        let (since, limit) = match params.page_token.as_deref() {
            Some(token) => {
                let token = PageToken::decode(token)?;
                if token.filter_digest != filter_digest {
                    return Err(AppError::bad_request(
                        "INVALID_PAGE_TOKEN",
                        "page token was issued for a different filter",
                    ));
                }
                (token.last_version, token.limit)
            }
            None => {
                let limit = params.limit.unwrap_or(DEFAULT_PULL_LIMIT).clamp(1, MAX_PULL_LIMIT);
                (params.since_version, limit)
            }
        };

        let schema_filter = (!params.schema_types.is_empty()).then_some(params.schema_types.as_slice());

        let mut tx = self.pool.begin().await?;
        set_repeatable_read(&mut tx).await?;
        let current_version = current_sync_version(&mut tx).await?;
        let mut records =
            self.observations.fetch_window(&mut tx, since, current_version, schema_filter, limit + 1).await?;
        tx.commit().await?;

        let has_more = records.len() as i64 > limit;
        records.truncate(limit as usize);

        let change_cutoff = records.last().map_or(since, |r| r.version);
        let next_page_token = has_more.then(|| {
            PageToken { last_version: change_cutoff, filter_digest: filter_digest.clone(), limit }.encode()
        });

        tracing::debug!(returned = records.len(), has_more, current_version, "Pull page served");

        Ok(PullResponse {
            current_version,
            records: records.into_iter().map(ObservationDto::from).collect(),
            change_cutoff,
            next_page_token,
            has_more,
        })
    }

    /// Idempotent push. A transmission already answered inside the retention
    /// window replays the stored bytes without touching the observation
    /// table. Otherwise records are processed independently, each in its own
    /// transaction, so one bad record never rolls back its neighbours.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, request),
        fields(client_id = %request.client_id, transmission_id = %request.transmission_id, records = request.records.len())
    )]
    pub async fn push(&self, request: PushRequest) -> Result<PushReply> {
        if request.client_id.is_empty() {
            return Err(AppError::bad_request("MISSING_CLIENT_ID", "client_id must not be empty"));
        }

        {
            let mut conn = self.pool.acquire().await?;
            if let Some(body) = self
                .transmissions
                .find_response(&mut conn, &request.client_id, request.transmission_id, self.retention_hours)
                .await?
            {
                tracing::debug!("Replaying cached push response");
                return Ok(PushReply { body, replayed: true });
            }
        }

        let mut success_count = 0;
        let mut failed_records = Vec::new();
        let mut warnings = Vec::new();

        for (index, record) in request.records.iter().enumerate() {
            match self.apply_record(index, record, &mut warnings).await {
                Ok(()) => success_count += 1,
                Err(failure) => failed_records.push(failure),
            }
        }

        let mut conn = self.pool.acquire().await?;
        let current_version = current_sync_version(&mut conn).await?;

        let response = PushResponse { current_version, success_count, failed_records, warnings };
        let body = serde_json::to_vec(&response).map_err(|_| AppError::Internal)?;

        self.transmissions.save_response(&mut conn, &request.client_id, request.transmission_id, &body).await?;

        tracing::info!(
            success_count,
            failed = response.failed_records.len(),
            current_version,
            "Push processed"
        );

        Ok(PushReply { body, replayed: false })
    }

    /// Validates and writes one record. Returns the per-record failure
    /// instead of propagating, so the push can report partial success.
    async fn apply_record(
        &self,
        index: usize,
        record: &PushRecordDto,
        warnings: &mut Vec<PushWarning>,
    ) -> std::result::Result<(), FailedRecord> {
        let fail = |code: &str, message: &str| FailedRecord {
            index,
            observation_id: (!record.observation_id.is_empty()).then(|| record.observation_id.clone()),
            code: code.to_string(),
            message: message.to_string(),
        };

        if record.observation_id.is_empty() {
            return Err(fail("MISSING_OBSERVATION_ID", "observation_id must not be empty"));
        }
        let data = match &record.data {
            Some(data) if !data.is_null() => data,
            _ => return Err(fail("INVALID_PAYLOAD", "record data is missing or null")),
        };
        if record.form_version.is_empty() {
            return Err(fail("UNSUPPORTED_SCHEMA_VERSION", "form_version must not be empty"));
        }
        let serialized_len = serde_json::to_vec(data).map(|b| b.len()).unwrap_or(usize::MAX);
        if serialized_len > self.max_record_bytes {
            return Err(fail("RECORD_TOO_LARGE", "record data exceeds the size cap"));
        }

        let result: Result<()> = async {
            let write = ObservationWrite {
                observation_id: &record.observation_id,
                form_type: &record.form_type,
                form_version: &record.form_version,
                data,
                deleted: record.deleted,
            };

            let mut attempt = 0;
            let (existing_version, new_version) = loop {
                attempt += 1;
                let mut tx = self.pool.begin().await?;

                let existing = self.observations.find_version(&mut tx, &record.observation_id).await?;
                let written = if existing.is_some() {
                    self.observations.update(&mut tx, &write).await
                } else {
                    self.observations.insert(&mut tx, &write).await
                };

                match written {
                    Ok(version) => {
                        tx.commit().await?;
                        break (existing, version);
                    }
                    // Lost an insert race for a brand-new id; the row exists
                    // now, so one retry lands on the update path.
                    Err(e) if is_unique_violation(&e) && attempt == 1 => {
                        drop(tx);
                    }
                    Err(e) => return Err(e),
                }
            };

            if let Some(existing) = existing_version
                && record.version != Some(existing)
            {
                warnings.push(PushWarning {
                    index,
                    observation_id: record.observation_id.clone(),
                    code: "OVERWRITE_WITHOUT_BASE".to_string(),
                    message: format!(
                        "overwrote version {existing} without the client holding it (new version {new_version})"
                    ),
                });
            }
            if record.form_type.is_empty() {
                warnings.push(PushWarning {
                    index,
                    observation_id: record.observation_id.clone(),
                    code: "EMPTY_FORM_TYPE".to_string(),
                    message: "record has an empty form_type".to_string(),
                });
            }

            Ok(())
        }
        .await;

        result.map_err(|e| {
            tracing::warn!(error = %e, observation_id = %record.observation_id, "Record write failed");
            fail("STORAGE_FAILURE", "the record could not be stored; retry under the same transmission_id")
        })
    }
}
