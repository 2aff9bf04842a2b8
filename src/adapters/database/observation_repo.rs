use crate::adapters::database::records::ObservationRecord;
use crate::domain::observation::{Observation, ObservationWrite};
use crate::error::Result;
use sqlx::PgConnection;

#[derive(Clone, Debug, Default)]
pub struct ObservationRepository {}

impl ObservationRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a new observation. The version trigger stamps the row from
    /// the shared counter exactly once; the assigned value is returned. An
    /// `ON CONFLICT` upsert is deliberately not used here: its BEFORE INSERT
    /// trigger fires even for rows that take the update path, which would
    /// burn a counter value and leave gaps in the version sequence.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the write fails, including the unique
    /// violation raised when the id was inserted concurrently.
    #[tracing::instrument(level = "debug", skip(self, conn, write), fields(observation_id = %write.observation_id))]
    pub(crate) async fn insert(&self, conn: &mut PgConnection, write: &ObservationWrite<'_>) -> Result<i64> {
        let (version,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO observations (observation_id, form_type, form_version, data, deleted)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING version
            "#,
        )
        .bind(write.observation_id)
        .bind(write.form_type)
        .bind(write.form_version)
        .bind(write.data)
        .bind(write.deleted)
        .fetch_one(conn)
        .await?;

        Ok(version)
    }

    /// Mutates an existing observation; the update trigger assigns the next
    /// version. Rows are never physically removed, so a previously observed
    /// id is always present.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the write fails.
    #[tracing::instrument(level = "debug", skip(self, conn, write), fields(observation_id = %write.observation_id))]
    pub(crate) async fn update(&self, conn: &mut PgConnection, write: &ObservationWrite<'_>) -> Result<i64> {
        let (version,): (i64,) = sqlx::query_as(
            r#"
            UPDATE observations SET
                form_type = $2,
                form_version = $3,
                data = $4,
                deleted = $5,
                updated_at = NOW(),
                synced_at = NOW()
            WHERE observation_id = $1
            RETURNING version
            "#,
        )
        .bind(write.observation_id)
        .bind(write.form_type)
        .bind(write.form_version)
        .bind(write.data)
        .bind(write.deleted)
        .fetch_one(conn)
        .await?;

        Ok(version)
    }

    /// Current version of an observation, if it exists.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_version(&self, conn: &mut PgConnection, observation_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM observations WHERE observation_id = $1")
            .bind(observation_id)
            .fetch_optional(conn)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    /// Fetches the pull window `since < version <= upto`, optionally
    /// filtered by form type, ordered by ascending version. Soft-deleted
    /// rows are included; the caller decides how many rows it wanted.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, schema_types))]
    pub(crate) async fn fetch_window(
        &self,
        conn: &mut PgConnection,
        since: i64,
        upto: i64,
        schema_types: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<Observation>> {
        let rows = sqlx::query_as::<_, ObservationRecord>(
            r#"
            SELECT observation_id, form_type, form_version, data, deleted,
                   version, created_at, updated_at, synced_at
            FROM observations
            WHERE version > $1
              AND version <= $2
              AND ($3::text[] IS NULL OR form_type = ANY($3))
            ORDER BY version ASC
            LIMIT $4
            "#,
        )
        .bind(since)
        .bind(upto)
        .bind(schema_types)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
