use crate::api::AppState;
use crate::api::dto::auth::{LoginRequest, RefreshRequest, TokenResponse};
use crate::api::middleware::AppJson;
use crate::domain::auth::AuthSession;
use crate::error::Result;
use axum::{Json, extract::State};

fn token_response(session: AuthSession) -> Json<TokenResponse> {
    Json(TokenResponse {
        token: session.token,
        refresh_token: session.refresh_token,
        expires_at: session.expires_at,
    })
}

/// Verifies credentials and issues a token pair. Unknown user and wrong
/// password both yield a bare 401.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let session = state.auth_service.login(&payload.username, &payload.password).await?;
    Ok(token_response(session))
}

/// Rotates an access/refresh token pair.
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let session = state.auth_service.refresh(&payload.refresh_token).await?;
    Ok(token_response(session))
}
