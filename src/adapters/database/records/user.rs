use crate::domain::user::{Role, User};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            // Constrained by CHECK; fall back to the least-privileged role.
            role: Role::parse(&r.role).unwrap_or(Role::ReadOnly),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
