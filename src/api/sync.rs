use crate::api::AppState;
use crate::api::dto::sync::{PullQuery, PullRequest, PullResponse, PushRequest};
use crate::api::middleware::{AppJson, AuthUser};
use crate::domain::user::Role;
use crate::error::Result;
use crate::services::sync_service::PullParams;
use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// Cursor-based pull of observation history.
pub async fn pull(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PullQuery>,
    AppJson(body): AppJson<PullRequest>,
) -> Result<Json<PullResponse>> {
    auth_user.require(Role::ReadOnly)?;

    let params = PullParams {
        client_id: body.client_id,
        since_version: body.since.map_or(0, |s| s.version),
        schema_types: query.schema_type_list(),
        limit: query.limit,
        page_token: query.page_token,
    };

    Ok(Json(state.sync_service.pull(params).await?))
}

/// Idempotent push. The service hands back pre-serialized bytes so a
/// replayed transmission is byte-equal to the original response.
pub async fn push(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<PushRequest>,
) -> Result<Response> {
    auth_user.require(Role::ReadWrite)?;

    let reply = state.sync_service.push(body).await?;

    let response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    );
    Ok(response.into_response())
}
