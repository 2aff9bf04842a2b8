use crate::adapters::database::records::AttachmentOperationRecord;
use crate::domain::attachment::{AttachmentOp, AttachmentOperation};
use crate::error::Result;
use sqlx::PgConnection;

/// Parameters for one appended log row.
#[derive(Debug)]
pub struct NewOperation<'a> {
    pub attachment_id: &'a str,
    pub operation: AttachmentOp,
    pub client_id: Option<&'a str>,
    pub size: i64,
    pub content_type: Option<&'a str>,
    pub content_hash: Option<&'a str>,
}

#[derive(Clone, Debug, Default)]
pub struct AttachmentRepository {}

impl AttachmentRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Appends one operation row. The version trigger stamps it from the
    /// shared counter; the assigned value is returned.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, op), fields(attachment_id = %op.attachment_id))]
    pub(crate) async fn append(&self, conn: &mut PgConnection, op: &NewOperation<'_>) -> Result<i64> {
        let (version,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO attachment_operations
                (attachment_id, operation, client_id, size, content_type, content_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING version
            "#,
        )
        .bind(op.attachment_id)
        .bind(op.operation.as_str())
        .bind(op.client_id)
        .bind(op.size)
        .bind(op.content_type)
        .bind(op.content_hash)
        .fetch_one(conn)
        .await?;

        Ok(version)
    }

    /// The operation with the greatest version for an id, i.e. its effective
    /// state.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn latest_operation(
        &self,
        conn: &mut PgConnection,
        attachment_id: &str,
    ) -> Result<Option<AttachmentOperation>> {
        let record = sqlx::query_as::<_, AttachmentOperationRecord>(
            r#"
            SELECT attachment_id, operation, client_id, size, content_type, content_hash, version, created_at
            FROM attachment_operations
            WHERE attachment_id = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(attachment_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Manifest window: for every attachment id that has any operation past
    /// the cursor, the single greatest-version operation — chosen over all
    /// rows, then filtered to global rows or the requesting client. The
    /// scope filter must run after the per-id winner is picked: filtering
    /// first would let a stale global row stand in for a newer operation
    /// scoped to another client.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn latest_operations_since(
        &self,
        conn: &mut PgConnection,
        client_id: &str,
        since_version: i64,
    ) -> Result<Vec<AttachmentOperation>> {
        let records = sqlx::query_as::<_, AttachmentOperationRecord>(
            r#"
            SELECT attachment_id, operation, client_id, size, content_type, content_hash, version, created_at
            FROM (
                SELECT DISTINCT ON (attachment_id)
                       attachment_id, operation, client_id, size, content_type, content_hash, version, created_at
                FROM attachment_operations
                WHERE attachment_id IN (
                    SELECT attachment_id FROM attachment_operations WHERE version > $2
                )
                ORDER BY attachment_id, version DESC
            ) latest
            WHERE latest.client_id IS NULL OR latest.client_id = $1
            "#,
        )
        .bind(client_id)
        .bind(since_version)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
