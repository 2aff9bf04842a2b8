#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::attachment_repo::AttachmentRepository;
use crate::adapters::database::observation_repo::ObservationRepository;
use crate::adapters::database::transmission_repo::TransmissionRepository;
use crate::adapters::database::user_repo::UserRepository;
use crate::adapters::storage::FsStorage;
use crate::api::AppState;
use crate::config::Config;
use crate::services::attachment_service::AttachmentService;
use crate::services::auth_service::AuthService;
use crate::services::bundle::BundleService;
use crate::services::sync_service::SyncService;
use crate::services::user_service::UserService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    pub transmission_worker: workers::TransmissionCleanupWorker,
    pub upload_sweep_worker: workers::UploadSweepWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut tasks = Vec::new();

        let transmission_worker = self.transmission_worker;
        let transmission_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            transmission_worker.run(transmission_rx).await;
        }));

        let sweep_worker = self.upload_sweep_worker;
        tasks.push(tokio::spawn(async move {
            sweep_worker.run(shutdown_rx).await;
        }));

        tasks
    }
}

impl App {
    /// Wires repositories, services, and workers from configuration and a
    /// live pool, creating the filesystem layout as a side effect.
    ///
    /// # Errors
    /// Returns an error if storage directories cannot be created or the
    /// bootstrap admin cannot be written.
    #[tracing::instrument(skip(config, pool))]
    pub async fn initialize(config: &Config, pool: adapters::database::DbPool) -> anyhow::Result<Self> {
        // Initialize storage adapters
        let fs_storage = Arc::new(FsStorage::new(config.attachments_dir()));
        fs_storage.init().await.map_err(|e| anyhow::anyhow!("attachment storage init failed: {e}"))?;

        let bundle_service = BundleService::new(config.bundle_root(), config.max_versions_kept);
        bundle_service.init().await.map_err(|e| anyhow::anyhow!("bundle storage init failed: {e}"))?;

        // Initialize repositories
        let observation_repo = ObservationRepository::new();
        let attachment_repo = AttachmentRepository::new();
        let user_repo = UserRepository::new();
        let transmission_repo = TransmissionRepository::new();

        // Initialize services
        let auth_service = AuthService::new(
            pool.clone(),
            user_repo.clone(),
            config.jwt_secret.clone(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        );
        let user_service = UserService::new(pool.clone(), user_repo, auth_service.clone());
        let sync_service = SyncService::new(
            pool.clone(),
            observation_repo,
            transmission_repo.clone(),
            config.max_record_bytes,
            config.transmission_retention_hours,
        );
        let attachment_service = AttachmentService::new(
            pool.clone(),
            attachment_repo,
            Arc::clone(&fs_storage) as Arc<dyn adapters::storage::BlobStorage>,
            config.attachment_max_size_bytes,
        );

        if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
            user_service.bootstrap_admin(username, password).await?;
        }

        let workers = Workers {
            transmission_worker: workers::TransmissionCleanupWorker::new(
                pool.clone(),
                transmission_repo,
                config.transmission_retention_hours,
                config.transmission_cleanup_interval_secs,
            ),
            upload_sweep_worker: workers::UploadSweepWorker::new(
                fs_storage,
                Duration::from_secs(config.upload_sweep_max_age_secs),
                config.upload_sweep_interval_secs,
            ),
        };

        let state = AppState {
            pool,
            auth_service,
            user_service,
            sync_service,
            attachment_service,
            bundle_service,
        };

        Ok(Self { state, workers })
    }
}

/// Runs database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &adapters::database::DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await.map_err(Into::into)
}

/// Sets up a panic hook that logs the panic message and location.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let msg = payload
            .downcast_ref::<&str>()
            .map_or_else(|| payload.downcast_ref::<String>().map_or_else(|| "Box<Any>", String::as_str), |s| *s);

        let location = panic_info.location().map_or_else(
            || "unknown".to_string(),
            |location| format!("{}:{}:{}", location.file(), location.line(), location.column()),
        );

        tracing::error!(
            panic.message = %msg,
            panic.location = %location,
            "Application panicked"
        );
    }));
}

/// Returns a future that completes when a termination signal is received.
///
/// # Panics
/// Panics if the signal handlers cannot be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}

/// Spawns a task that listens for OS signals and broadcasts a shutdown signal.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });
}
