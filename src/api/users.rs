use crate::api::AppState;
use crate::api::dto::users::{
    ChangePasswordRequest, CreateUserRequest, ResetPasswordRequest, UserDto, UserListResponse,
};
use crate::api::middleware::{AppJson, AuthUser};
use crate::domain::user::Role;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn create(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    auth_user.require(Role::Admin)?;

    let user = state.user_service.create(&payload.username, &payload.password, payload.role).await?;
    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

pub async fn list(auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<UserListResponse>> {
    auth_user.require(Role::Admin)?;

    let users = state.user_service.list().await?;
    Ok(Json(UserListResponse { users: users.into_iter().map(UserDto::from).collect() }))
}

pub async fn remove(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode> {
    auth_user.require(Role::Admin)?;

    state.user_service.delete(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<StatusCode> {
    auth_user.require(Role::Admin)?;

    state.user_service.reset_password(&payload.username, &payload.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Self-service; any authenticated role, requires the current password.
pub async fn change_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<StatusCode> {
    state
        .user_service
        .change_password(auth_user.user_id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
