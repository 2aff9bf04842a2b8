use crate::api::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Server and build information.
pub async fn version() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "api_versions": ["1"],
    }))
}

/// Liveness plus a timeout-bounded database probe.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = matches!(
        timeout(DB_PROBE_TIMEOUT, sqlx::query("SELECT 1").execute(&state.pool)).await,
        Ok(Ok(_))
    );

    let status_code = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    if !db_ok {
        tracing::warn!("Health probe failed: database unreachable");
    }

    (
        status_code,
        Json(json!({
            "status": if db_ok { "ok" } else { "error" },
            "database": if db_ok { "ok" } else { "error" },
        })),
    )
}
