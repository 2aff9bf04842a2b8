use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// One entry of the `errors[]` array in a problem response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub code: String,
    pub detail: String,
}

impl FieldError {
    #[must_use]
    pub fn new(path: impl Into<String>, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { path: path.into(), code: code.into(), detail: detail.into() }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Authentication failed")]
    AuthError,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Invalid request: {detail}")]
    BadRequest { code: &'static str, detail: String },
    #[error("Validation failed: {detail}")]
    Validation { code: &'static str, detail: String, errors: Vec<FieldError> },
    #[error("Conflict: {detail}")]
    Conflict { code: &'static str, detail: String },
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Internal server error")]
    Internal,
}

impl AppError {
    #[must_use]
    pub fn bad_request(code: &'static str, detail: impl Into<String>) -> Self {
        Self::BadRequest { code, detail: detail.into() }
    }

    #[must_use]
    pub fn conflict(code: &'static str, detail: impl Into<String>) -> Self {
        Self::Conflict { code, detail: detail.into() }
    }

    #[must_use]
    pub fn validation(code: &'static str, detail: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Validation { code, detail: detail.into(), errors }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// RFC-7807 problem body. Identical inputs in identical state produce an
/// identical body, so clients can branch on `code`.
#[derive(Debug, Serialize)]
struct Problem {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, detail, code, errors) = match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None, None)
            }
            Self::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized", None, None, None)
            }
            Self::Forbidden => {
                tracing::debug!("Insufficient role");
                (StatusCode::FORBIDDEN, "Forbidden", None, None, None)
            }
            Self::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Not found", None, None, None)
            }
            Self::BadRequest { code, detail } => {
                tracing::debug!(code, detail = %detail, "Bad request");
                (StatusCode::BAD_REQUEST, "Bad request", Some(detail), Some(code), None)
            }
            Self::Validation { code, detail, errors } => {
                tracing::debug!(code, detail = %detail, "Validation failed");
                (StatusCode::BAD_REQUEST, "Validation failed", Some(detail), Some(code), Some(errors))
            }
            Self::Conflict { code, detail } => {
                tracing::debug!(code, detail = %detail, "Conflict");
                (StatusCode::CONFLICT, "Conflict", Some(detail), Some(code), None)
            }
            Self::PayloadTooLarge => {
                tracing::debug!("Payload too large");
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large", None, None, None)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None, None)
            }
        };

        let body = Problem {
            problem_type: "about:blank",
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            code,
            errors,
        };

        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, axum::http::HeaderValue::from_static("application/problem+json"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_carries_code() {
        let err = AppError::conflict("ATTACHMENT_EXISTS", "attachment a-1 already exists");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(axum::http::header::CONTENT_TYPE).map(|v| v.to_str().ok()),
            Some(Some("application/problem+json"))
        );
    }

    #[test]
    fn validation_is_bad_request() {
        let err = AppError::validation(
            "INVALID_BUNDLE_STRUCTURE",
            "bundle failed validation",
            vec![FieldError::new("app/index.html", "MISSING_FILE", "required file is absent")],
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
