use crate::adapters::database::DbPool;
use crate::adapters::database::user_repo::UserRepository;
use crate::domain::user::{Role, User};
use crate::error::{AppError, Result};
use crate::services::auth_service::AuthService;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug)]
pub struct UserService {
    pool: DbPool,
    users: UserRepository,
    auth: AuthService,
}

impl UserService {
    #[must_use]
    pub fn new(pool: DbPool, users: UserRepository, auth: AuthService) -> Self {
        Self { pool, users, auth }
    }

    fn check_username(username: &str) -> Result<()> {
        if username.is_empty() || username.len() > 64 {
            return Err(AppError::bad_request("INVALID_USERNAME", "username must be 1-64 characters"));
        }
        Ok(())
    }

    fn check_password(password: &str) -> Result<()> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::bad_request(
                "PASSWORD_TOO_SHORT",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(err(level = "debug"), skip(self, password))]
    pub async fn create(&self, username: &str, password: &str, role: Role) -> Result<User> {
        Self::check_username(username)?;
        Self::check_password(password)?;

        let password_hash = self.auth.hash_password(password).await?;

        let mut conn = self.pool.acquire().await?;
        let user = self.users.create(&mut conn, username, &password_hash, role).await.map_err(|e| {
            if let AppError::Database(sqlx::Error::Database(db_err)) = &e
                && db_err.code().as_deref() == Some("23505")
            {
                return AppError::conflict("USERNAME_EXISTS", format!("username {username} already exists"));
            }
            e
        })?;

        tracing::info!(username, role = %role, "User created");
        Ok(user)
    }

    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn list(&self) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await?;
        self.users.list(&mut conn).await
    }

    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn delete(&self, username: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.users.delete_by_username(&mut conn, username).await? {
            tracing::info!(username, "User deleted");
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// Admin path: overwrite a user's password without knowing the current
    /// one.
    #[tracing::instrument(err(level = "debug"), skip(self, new_password))]
    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<()> {
        Self::check_password(new_password)?;

        let user = {
            let mut conn = self.pool.acquire().await?;
            self.users.find_by_username(&mut conn, username).await?.ok_or(AppError::NotFound)?
        };

        let password_hash = self.auth.hash_password(new_password).await?;
        let mut conn = self.pool.acquire().await?;
        self.users.update_password(&mut conn, user.id, &password_hash).await?;

        tracing::info!(username, "Password reset");
        Ok(())
    }

    /// Self-service path: requires the current password.
    #[tracing::instrument(err(level = "debug"), skip(self, current_password, new_password))]
    pub async fn change_password(&self, user_id: Uuid, current_password: &str, new_password: &str) -> Result<()> {
        Self::check_password(new_password)?;

        let user = {
            let mut conn = self.pool.acquire().await?;
            self.users.find_by_id(&mut conn, user_id).await?.ok_or(AppError::AuthError)?
        };

        if !self.auth.verify_password(current_password, &user.password_hash).await? {
            return Err(AppError::AuthError);
        }

        let password_hash = self.auth.hash_password(new_password).await?;
        let mut conn = self.pool.acquire().await?;
        self.users.update_password(&mut conn, user.id, &password_hash).await?;

        tracing::info!(username = %user.username, "Password changed");
        Ok(())
    }

    /// First-boot bootstrap: creates the configured admin while the user
    /// table is empty. Returns whether an account was created.
    #[tracing::instrument(err, skip(self, password))]
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<bool> {
        {
            let mut conn = self.pool.acquire().await?;
            if self.users.count(&mut conn).await? > 0 {
                return Ok(false);
            }
        }

        self.create(username, password, Role::Admin).await?;
        tracing::info!(username, "Bootstrap admin created");
        Ok(true)
    }
}
