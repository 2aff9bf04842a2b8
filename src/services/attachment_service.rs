use crate::adapters::database::attachment_repo::{AttachmentRepository, NewOperation};
use crate::adapters::database::{DbPool, current_sync_version, set_repeatable_read};
use crate::adapters::storage::{BlobStorage, StorageError, StorageStream};
use crate::api::dto::attachments::{
    ManifestAction, ManifestEntry, ManifestResponse, OperationCount,
};
use crate::domain::attachment::{AttachmentOp, AttachmentOperation, is_valid_attachment_id};
use crate::error::{AppError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct AttachmentService {
    pool: DbPool,
    repo: AttachmentRepository,
    storage: Arc<dyn BlobStorage>,
    max_size_bytes: usize,
}

impl std::fmt::Debug for AttachmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentService").field("max_size_bytes", &self.max_size_bytes).finish_non_exhaustive()
    }
}

impl AttachmentService {
    #[must_use]
    pub fn new(pool: DbPool, repo: AttachmentRepository, storage: Arc<dyn BlobStorage>, max_size_bytes: usize) -> Self {
        Self { pool, repo, storage, max_size_bytes }
    }

    fn check_id(attachment_id: &str) -> Result<()> {
        if is_valid_attachment_id(attachment_id) {
            Ok(())
        } else {
            Err(AppError::bad_request("INVALID_ATTACHMENT_ID", "attachment id contains invalid characters"))
        }
    }

    /// Streams a blob into storage and records the `create` operation.
    /// Blobs are immutable: an id whose latest operation is live conflicts.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, stream, content_type),
        fields(attachment_size = tracing::field::Empty)
    )]
    pub async fn upload(
        &self,
        attachment_id: &str,
        client_id: Option<&str>,
        content_type: Option<String>,
        stream: StorageStream,
    ) -> Result<AttachmentOperation> {
        Self::check_id(attachment_id)?;

        {
            let mut conn = self.pool.acquire().await?;
            if let Some(op) = self.repo.latest_operation(&mut conn, attachment_id).await?
                && op.is_live()
            {
                return Err(AppError::conflict(
                    "ATTACHMENT_EXISTS",
                    format!("attachment {attachment_id} already exists"),
                ));
            }
        }

        let blob = self.storage.put(attachment_id, stream, self.max_size_bytes).await.map_err(|e| match e {
            StorageError::ExceedsLimit => AppError::PayloadTooLarge,
            _ => AppError::Internal,
        })?;
        tracing::Span::current().record("attachment_size", blob.size);

        let op = NewOperation {
            attachment_id,
            operation: AttachmentOp::Create,
            client_id,
            size: blob.size as i64,
            content_type: content_type.as_deref(),
            content_hash: Some(blob.content_hash.as_str()),
        };

        let version = {
            let mut tx = self.pool.begin().await?;
            let version = match self.repo.append(&mut tx, &op).await {
                Ok(version) => version,
                Err(e) => {
                    // No operation row means the blob must not be visible either.
                    let _ = self.storage.delete(attachment_id).await;
                    return Err(e);
                }
            };
            tx.commit().await?;
            version
        };

        tracing::debug!(attachment_id, version, size = blob.size, "Attachment uploaded");

        Ok(AttachmentOperation {
            attachment_id: attachment_id.to_string(),
            operation: AttachmentOp::Create,
            client_id: client_id.map(String::from),
            size: blob.size as i64,
            content_type,
            content_hash: Some(blob.content_hash),
            version,
            created_at: time::OffsetDateTime::now_utc(),
        })
    }

    /// Effective live operation for an id, or `NotFound`.
    async fn live_operation(&self, attachment_id: &str) -> Result<AttachmentOperation> {
        Self::check_id(attachment_id)?;
        let mut conn = self.pool.acquire().await?;
        match self.repo.latest_operation(&mut conn, attachment_id).await? {
            Some(op) if op.is_live() => Ok(op),
            _ => Err(AppError::NotFound),
        }
    }

    /// Streams a blob out of storage together with its log entry (for ETag
    /// and content-type headers).
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn download(&self, attachment_id: &str) -> Result<(AttachmentOperation, u64, StorageStream)> {
        let op = self.live_operation(attachment_id).await?;
        let (size, stream) = self.storage.get(attachment_id).await.map_err(|e| match e {
            StorageError::NotFound => AppError::NotFound,
            _ => AppError::Internal,
        })?;
        Ok((op, size, stream))
    }

    /// Existence probe; returns the log entry when the attachment is live.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn probe(&self, attachment_id: &str) -> Result<AttachmentOperation> {
        self.live_operation(attachment_id).await
    }

    /// Records a `delete` operation and removes the blob best-effort. The
    /// log row is written even when the blob is already gone; deleting an
    /// already-deleted attachment records nothing (semantic idempotence).
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn remove(&self, attachment_id: &str, client_id: Option<&str>) -> Result<()> {
        Self::check_id(attachment_id)?;

        let latest = {
            let mut conn = self.pool.acquire().await?;
            self.repo.latest_operation(&mut conn, attachment_id).await?
        };

        match latest {
            None => return Err(AppError::NotFound),
            Some(op) if !op.is_live() => return Ok(()),
            Some(_) => {}
        }

        let op = NewOperation {
            attachment_id,
            operation: AttachmentOp::Delete,
            client_id,
            size: 0,
            content_type: None,
            content_hash: None,
        };

        let mut tx = self.pool.begin().await?;
        let version = self.repo.append(&mut tx, &op).await?;
        tx.commit().await?;

        if let Err(e) = self.storage.delete(attachment_id).await {
            tracing::warn!(attachment_id, error = %e, "Blob removal failed after delete operation");
        }

        tracing::debug!(attachment_id, version, "Attachment deleted");
        Ok(())
    }

    /// Incremental manifest: the latest operation per attachment id touched
    /// after the cursor, scoped to global entries or the requesting client,
    /// anchored to the same counter observations use.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn manifest(&self, client_id: &str, since_version: i64) -> Result<ManifestResponse> {
        let mut tx = self.pool.begin().await?;
        set_repeatable_read(&mut tx).await?;
        let current_version = current_sync_version(&mut tx).await?;
        let operations = self.repo.latest_operations_since(&mut tx, client_id, since_version).await?;
        tx.commit().await?;

        let mut entries = Vec::with_capacity(operations.len());
        let mut total_download_size = 0;
        let mut downloads = 0;
        let mut deletes = 0;

        for op in operations {
            let action = if op.is_live() { ManifestAction::Download } else { ManifestAction::Delete };
            match action {
                ManifestAction::Download => {
                    downloads += 1;
                    total_download_size += op.size;
                }
                ManifestAction::Delete => deletes += 1,
            }
            entries.push(ManifestEntry {
                attachment_id: op.attachment_id,
                operation: action,
                size: if matches!(op.operation, AttachmentOp::Delete) { 0 } else { op.size },
                content_type: op.content_type,
                version: op.version,
            });
        }

        entries.sort_by(|a, b| a.version.cmp(&b.version));

        Ok(ManifestResponse {
            current_version,
            operations: entries,
            total_download_size,
            operation_count: OperationCount { download: downloads, delete: deletes },
        })
    }
}
