use time::OffsetDateTime;

/// Lifecycle verb of one `attachment_operations` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOp {
    Create,
    Update,
    Delete,
}

impl AttachmentOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One row of the append-only attachment log. The effective state of an
/// attachment id is the row with the greatest version.
#[derive(Debug, Clone)]
pub struct AttachmentOperation {
    pub attachment_id: String,
    pub operation: AttachmentOp,
    pub client_id: Option<String>,
    pub size: i64,
    pub content_type: Option<String>,
    pub content_hash: Option<String>,
    pub version: i64,
    pub created_at: OffsetDateTime,
}

impl AttachmentOperation {
    /// True unless the operation retires the attachment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !matches!(self.operation, AttachmentOp::Delete)
    }
}

/// Attachment ids name filesystem entries, so they are restricted to a safe
/// character set.
#[must_use]
pub fn is_valid_attachment_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}
