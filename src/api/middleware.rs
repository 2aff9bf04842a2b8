use crate::api::AppState;
use crate::domain::user::Role;
use crate::error::{AppError, Result};
use axum::{
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

const API_VERSION_HEADER: &str = "x-api-version";
const SUPPORTED_API_VERSIONS: &[&str] = &["1", "latest"];

/// Authenticated request identity, extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Per-endpoint minimum-role gate; a higher role always passes.
    pub fn require(&self, min_role: Role) -> Result<()> {
        if self.role >= min_role { Ok(()) } else { Err(AppError::Forbidden) }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::AuthError)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::AuthError)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::AuthError)?;

        let claims = state.auth_service.validate_access(token)?;

        Ok(Self { user_id: claims.sub, username: claims.username, role: claims.role })
    }
}

/// JSON body extractor whose rejection speaks the same problem format as
/// every other error, instead of axum's plain-text default.
#[derive(Debug)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request("MALFORMED_BODY", rejection.body_text())),
        }
    }
}

/// Optional API version negotiation: absent selects the latest; an unknown
/// version is rejected up front rather than mis-served.
pub async fn check_api_version(request: Request, next: Next) -> Response {
    if let Some(value) = request.headers().get(API_VERSION_HEADER) {
        let supported = value.to_str().is_ok_and(|v| SUPPORTED_API_VERSIONS.contains(&v));
        if !supported {
            return AppError::bad_request("UNSUPPORTED_API_VERSION", "this server only speaks API version 1")
                .into_response();
        }
    }
    next.run(request).await
}
