use crate::adapters::database::DbPool;
use crate::adapters::database::transmission_repo::TransmissionRepository;
use crate::error::AppError;
use std::time::Duration;
use tracing::Instrument;

/// Prunes push idempotency rows that have aged past the retention window.
/// Out-of-window replays re-execute, which the latest-wins push semantics
/// tolerate.
#[derive(Debug)]
pub struct TransmissionCleanupWorker {
    pool: DbPool,
    repo: TransmissionRepository,
    retention_hours: i64,
    interval_secs: u64,
}

impl TransmissionCleanupWorker {
    #[must_use]
    pub fn new(pool: DbPool, repo: TransmissionRepository, retention_hours: i64, interval_secs: u64) -> Self {
        Self { pool, repo, retention_hours, interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("transmission_cleanup_iteration"))
                        .await
                    {
                        tracing::error!(error = ?e, "Transmission cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Transmission cleanup loop shutting down...");
    }

    /// # Errors
    /// Returns an error if the database connection or query fails.
    #[tracing::instrument(skip(self), err)]
    pub async fn perform_cleanup(&self) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        let removed = self.repo.delete_expired(&mut conn, self.retention_hours).await?;
        if removed > 0 {
            tracing::info!(count = %removed, "Pruned expired push transmissions");
        }
        Ok(())
    }
}
