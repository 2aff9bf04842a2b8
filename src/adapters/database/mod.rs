pub mod attachment_repo;
pub mod observation_repo;
pub mod records;
pub mod transmission_repo;
pub mod user_repo;

use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, Pool, Postgres};

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(database_url: &str) -> std::result::Result<DbPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(20).connect(database_url).await
}

/// Reads the authoritative sync counter. Inside a REPEATABLE READ
/// transaction this pins the snapshot every subsequent query sees.
pub async fn current_sync_version(conn: &mut PgConnection) -> Result<i64> {
    let (version,): (i64,) =
        sqlx::query_as("SELECT current_version FROM sync_version WHERE id = 1").fetch_one(conn).await?;
    Ok(version)
}

/// Escalates the open transaction to REPEATABLE READ. Must run before any
/// other statement in the transaction.
pub async fn set_repeatable_read(conn: &mut PgConnection) -> Result<()> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ").execute(conn).await?;
    Ok(())
}
