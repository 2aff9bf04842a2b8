use crate::error::Result;
use sqlx::PgConnection;
use uuid::Uuid;

/// Push idempotency side table: maps `(client_id, transmission_id)` to the
/// exact serialized response of the original push, so a retry replays
/// byte-equal bytes with no side effects.
#[derive(Clone, Debug, Default)]
pub struct TransmissionRepository {}

impl TransmissionRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Cached response for a transmission, if one was recorded inside the
    /// retention window.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_response(
        &self,
        conn: &mut PgConnection,
        client_id: &str,
        transmission_id: Uuid,
        retention_hours: i64,
    ) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            r#"
            SELECT response FROM sync_transmissions
            WHERE client_id = $1
              AND transmission_id = $2
              AND created_at > NOW() - make_interval(hours => $3)
            "#,
        )
        .bind(client_id)
        .bind(transmission_id)
        .bind(i32::try_from(retention_hours).unwrap_or(i32::MAX))
        .fetch_optional(conn)
        .await?;

        Ok(row.map(|(bytes,)| bytes))
    }

    /// Records a response. A concurrent retry that already inserted wins;
    /// the conflict is ignored so both callers return the same bytes.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, response))]
    pub(crate) async fn save_response(
        &self,
        conn: &mut PgConnection,
        client_id: &str,
        transmission_id: Uuid,
        response: &[u8],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_transmissions (client_id, transmission_id, response)
            VALUES ($1, $2, $3)
            ON CONFLICT (client_id, transmission_id) DO NOTHING
            "#,
        )
        .bind(client_id)
        .bind(transmission_id)
        .bind(response)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Prunes rows past the retention window. Returns the count removed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_expired(&self, conn: &mut PgConnection, retention_hours: i64) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM sync_transmissions WHERE created_at <= NOW() - make_interval(hours => $1)")
                .bind(i32::try_from(retention_hours).unwrap_or(i32::MAX))
                .execute(conn)
                .await?;
        Ok(result.rows_affected())
    }
}
