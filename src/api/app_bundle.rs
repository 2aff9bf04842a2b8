use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::domain::bundle::{BundleManifest, ChangeLog};
use crate::domain::user::Role;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Deserialize)]
pub struct PushQuery {
    /// `activate=false` uploads without switching the active version.
    #[serde(default = "default_activate")]
    pub activate: bool,
}

const fn default_activate() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    pub current: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub versions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PushBundleResponse {
    pub version: String,
    pub activated: bool,
    pub manifest: BundleManifest,
}

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub active: String,
}

/// Manifest of the active bundle, or the newest uploaded one with
/// `?preview=true`.
pub async fn get_manifest(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<BundleManifest>> {
    auth_user.require(Role::ReadOnly)?;
    Ok(Json(state.bundle_service.manifest(query.preview).await?))
}

/// Streams one bundle file with its content-hash ETag; 304 on match.
pub async fn download_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<PreviewQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    auth_user.require(Role::ReadOnly)?;

    let (bytes, hash, mime) = state.bundle_service.file(&path, query.preview).await?;
    let etag = format!("\"{hash}\"");

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|candidate| candidate.trim() == etag || candidate.trim() == "*"));

    let mut response = if if_none_match {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        let mut response = bytes.into_response();
        if let Ok(value) = mime.parse() {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        response
    };

    if let Ok(value) = etag.parse() {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

pub async fn list_versions(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<VersionsResponse>> {
    auth_user.require(Role::ReadOnly)?;
    let (versions, active) = state.bundle_service.list_versions().await?;
    Ok(Json(VersionsResponse { versions, active }))
}

/// Differential report between two bundle versions.
pub async fn changes(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<ChangeLog>> {
    auth_user.require(Role::ReadOnly)?;
    Ok(Json(state.bundle_service.changes(query.current, query.target).await?))
}

/// Admin upload of a new bundle archive. The archive streams to a staging
/// file first; validation and installation happen off the request path's
/// async workers.
pub async fn push_bundle(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PushQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    auth_user.require(Role::Admin)?;

    let mut field = loop {
        let next = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request("INVALID_MULTIPART", e.to_string()))?;
        match next {
            Some(field) if field.name() == Some("file") => break field,
            Some(_) => {}
            None => {
                return Err(AppError::bad_request("MISSING_FILE_FIELD", "multipart body must carry a file field"));
            }
        }
    };

    let staging = state.bundle_service.staging_archive_path();
    let result: Result<()> = async {
        let mut out = tokio::fs::File::create(&staging).await.map_err(|_| AppError::Internal)?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::bad_request("INVALID_MULTIPART", e.to_string()))?
        {
            out.write_all(&chunk).await.map_err(|_| AppError::Internal)?;
        }
        out.sync_all().await.map_err(|_| AppError::Internal)?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e);
    }

    let manifest = state.bundle_service.install(staging, query.activate).await?;

    Ok((
        StatusCode::CREATED,
        Json(PushBundleResponse { version: manifest.version.clone(), activated: query.activate, manifest }),
    ))
}

/// Atomically re-points the active bundle version.
pub async fn switch_version(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> Result<Json<SwitchResponse>> {
    auth_user.require(Role::Admin)?;
    state.bundle_service.switch(&version).await?;
    Ok(Json(SwitchResponse { active: version }))
}
