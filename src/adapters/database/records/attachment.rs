use crate::domain::attachment::{AttachmentOp, AttachmentOperation};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, FromRow)]
pub struct AttachmentOperationRecord {
    pub attachment_id: String,
    pub operation: String,
    pub client_id: Option<String>,
    pub size: i64,
    pub content_type: Option<String>,
    pub content_hash: Option<String>,
    pub version: i64,
    pub created_at: OffsetDateTime,
}

impl From<AttachmentOperationRecord> for AttachmentOperation {
    fn from(r: AttachmentOperationRecord) -> Self {
        Self {
            attachment_id: r.attachment_id,
            // The column has a CHECK constraint; an unknown verb can only
            // mean manual tampering, treated as a delete tombstone.
            operation: AttachmentOp::parse(&r.operation).unwrap_or(AttachmentOp::Delete),
            client_id: r.client_id,
            size: r.size,
            content_type: r.content_type,
            content_hash: r.content_hash,
            version: r.version,
            created_at: r.created_at,
        }
    }
}
