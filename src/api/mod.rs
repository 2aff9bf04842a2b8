use crate::adapters::database::DbPool;
use crate::config::Config;
use crate::services::attachment_service::AttachmentService;
use crate::services::auth_service::AuthService;
use crate::services::bundle::BundleService;
use crate::services::sync_service::SyncService;
use crate::services::user_service::UserService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod app_bundle;
pub mod attachments;
pub mod auth;
pub mod dto;
pub mod health;
pub mod middleware;
pub mod sync;
pub mod users;

#[derive(Clone, Debug)]
pub struct AppState {
    pub pool: DbPool,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub sync_service: SyncService,
    pub attachment_service: AttachmentService,
    pub bundle_service: BundleService,
}

/// Assembles the HTTP surface. Bundle pushes extract and validate whole
/// archives, so that route gets a larger body allowance and a longer
/// deadline than everything else.
pub fn app_router(state: AppState, config: &Config) -> Router {
    let general = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/sync/pull", post(sync::pull))
        .route("/sync/push", post(sync::push))
        .route("/attachments/manifest", post(attachments::manifest))
        .route("/app-bundle/manifest", get(app_bundle::get_manifest))
        .route("/app-bundle/download/{*path}", get(app_bundle::download_file))
        .route("/app-bundle/versions", get(app_bundle::list_versions))
        .route("/app-bundle/changes", get(app_bundle::changes))
        .route("/app-bundle/switch/{version}", post(app_bundle::switch_version))
        .route("/users/create", post(users::create))
        .route("/users", get(users::list))
        .route("/users/{username}", delete(users::remove))
        .route("/users/reset-password", post(users::reset_password))
        .route("/users/change-password", post(users::change_password))
        .route("/version", get(health::version))
        .route("/health", get(health::health))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

    let attachment_io = Router::new()
        .route(
            "/attachments/{id}",
            put(attachments::upload).get(attachments::download).delete(attachments::remove),
        )
        .layer(DefaultBodyLimit::max(config.attachment_max_size_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

    let bundle_push = Router::new()
        .route("/app-bundle/push", post(app_bundle::push_bundle))
        .layer(DefaultBodyLimit::max(config.bundle_max_size_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.bundle_push_timeout_secs)));

    Router::new()
        .merge(general)
        .merge(attachment_io)
        .merge(bundle_push)
        .layer(axum::middleware::from_fn(middleware::check_api_version))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
