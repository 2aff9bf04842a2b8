use crate::adapters::database::DbPool;
use crate::adapters::database::user_repo::UserRepository;
use crate::domain::auth::{AuthSession, Claims, TokenKind};
use crate::domain::user::User;
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    users: UserRepository,
    jwt_secret: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        users: UserRepository,
        jwt_secret: String,
        access_ttl_secs: u64,
        refresh_ttl_secs: u64,
    ) -> Self {
        Self { pool, users, jwt_secret, access_ttl_secs, refresh_ttl_secs }
    }

    /// bcrypt is deliberately CPU-costly, so hashing runs on the blocking
    /// pool.
    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|_| AppError::Internal)
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || Ok(bcrypt::verify(password, &password_hash).unwrap_or(false)))
            .await
            .map_err(|_| AppError::Internal)?
    }

    /// Verifies credentials and issues a token pair. Unknown user and wrong
    /// password are indistinguishable to the caller.
    #[tracing::instrument(err(level = "debug"), skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession> {
        let user = {
            let mut conn = self.pool.acquire().await?;
            self.users.find_by_username(&mut conn, username).await?.ok_or(AppError::AuthError)?
        };

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AppError::AuthError);
        }

        tracing::info!(username, "Login succeeded");
        self.issue_session(&user)
    }

    /// Rotates a token pair. Requires a refresh-typed token; the subject
    /// must still exist so deleted accounts cannot refresh themselves back
    /// in.
    #[tracing::instrument(err(level = "debug"), skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        let claims = Claims::decode(refresh_token, &self.jwt_secret)?;
        if claims.token_type != TokenKind::Refresh {
            return Err(AppError::AuthError);
        }

        let user = {
            let mut conn = self.pool.acquire().await?;
            self.users.find_by_id(&mut conn, claims.sub).await?.ok_or(AppError::AuthError)?
        };

        tracing::debug!(username = %user.username, "Tokens rotated");
        self.issue_session(&user)
    }

    /// Validates a bearer token for request authentication. Only
    /// access-typed tokens pass; a refresh token on the Authorization header
    /// is rejected.
    pub fn validate_access(&self, token: &str) -> Result<Claims> {
        let claims = Claims::decode(token, &self.jwt_secret)?;
        if claims.token_type != TokenKind::Access {
            return Err(AppError::AuthError);
        }
        Ok(claims)
    }

    fn issue_session(&self, user: &User) -> Result<AuthSession> {
        let access =
            Claims::new(user.id, user.username.clone(), user.role, TokenKind::Access, self.access_ttl_secs);
        let refresh =
            Claims::new(user.id, user.username.clone(), user.role, TokenKind::Refresh, self.refresh_ttl_secs);

        Ok(AuthSession {
            expires_at: access.exp,
            token: access.encode(&self.jwt_secret)?,
            refresh_token: refresh.encode(&self.jwt_secret)?,
        })
    }
}
