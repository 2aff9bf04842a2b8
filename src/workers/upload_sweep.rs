use crate::adapters::storage::FsStorage;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Removes temp files left behind by interrupted attachment uploads. A
/// client that disconnects mid-stream leaves only a staging file; this loop
/// reclaims them once they are old enough to be safely considered dead.
#[derive(Debug)]
pub struct UploadSweepWorker {
    storage: Arc<FsStorage>,
    max_age: Duration,
    interval_secs: u64,
}

impl UploadSweepWorker {
    #[must_use]
    pub fn new(storage: Arc<FsStorage>, max_age: Duration, interval_secs: u64) -> Self {
        Self { storage, max_age, interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let sweep = async {
                        match self.storage.sweep_temp(self.max_age).await {
                            Ok(removed) if removed > 0 => {
                                tracing::info!(count = %removed, "Swept abandoned upload temp files");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = ?e, "Upload sweep iteration failed"),
                        }
                    };
                    sweep.instrument(tracing::info_span!("upload_sweep_iteration")).await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Upload sweep loop shutting down...");
    }
}
