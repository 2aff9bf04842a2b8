use crate::api::AppState;
use crate::api::dto::attachments::{AttachmentUploadResponse, ManifestRequest, ManifestResponse};
use crate::api::middleware::{AppJson, AuthUser};
use crate::domain::user::Role;
use crate::error::{AppError, Result};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};

/// Client scope for an attachment operation; absent means global.
const CLIENT_ID_HEADER: &str = "x-client-id";

fn scope_client_id(headers: &HeaderMap) -> Option<String> {
    headers.get(CLIENT_ID_HEADER).and_then(|v| v.to_str().ok()).map(String::from).filter(|s| !s.is_empty())
}

fn etag_of(hash: &str) -> String {
    format!("\"{hash}\"")
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|candidate| candidate.trim() == etag || candidate.trim() == "*"))
}

/// Uploads a blob. The multipart `file` field is bridged onto the storage
/// stream through a bounded channel so nothing is buffered whole.
pub async fn upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    auth_user.require(Role::ReadWrite)?;

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

    let content_type = field.content_type().map(ToString::to_string);
    let client_id = scope_client_id(&headers);

    let (mut tx, rx) = futures::channel::mpsc::channel::<std::result::Result<bytes::Bytes, std::io::Error>>(8);

    let upload = state.attachment_service.upload(&id, client_id.as_deref(), content_type, rx.boxed());
    let feed = async {
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(std::io::Error::other(e.to_string()))).await;
                    break;
                }
            }
        }
        tx.close_channel();
    };

    let (operation, ()) = tokio::join!(upload, feed);
    let operation = operation?;

    Ok((
        StatusCode::CREATED,
        Json(AttachmentUploadResponse {
            attachment_id: operation.attachment_id,
            size: operation.size as u64,
            content_type: operation.content_type,
        }),
    ))
}

/// Streams a blob. Serves conditional requests from the stored content
/// hash; HEAD takes the same route with the body stripped.
pub async fn download(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    auth_user.require(Role::ReadOnly)?;

    let operation = state.attachment_service.probe(&id).await?;
    let etag = operation.content_hash.as_deref().map(etag_of);

    if let Some(etag) = &etag
        && etag_matches(&headers, etag)
    {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = etag.parse() {
            response.headers_mut().insert(header::ETAG, value);
        }
        return Ok(response);
    }

    let (operation, size, stream) = state.attachment_service.download(&id).await?;

    let mut response = Response::new(Body::from_stream(stream));
    let headers_mut = response.headers_mut();
    let content_type = operation.content_type.as_deref().unwrap_or("application/octet-stream");
    if let Ok(value) = content_type.parse() {
        headers_mut.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = size.to_string().parse() {
        headers_mut.insert(header::CONTENT_LENGTH, value);
    }
    if let Some(etag) = etag
        && let Ok(value) = etag.parse()
    {
        headers_mut.insert(header::ETAG, value);
    }

    Ok(response)
}

/// Records a delete operation and retires the blob. Idempotent: deleting an
/// already-deleted attachment is a no-op.
pub async fn remove(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    auth_user.require(Role::ReadWrite)?;

    let client_id = scope_client_id(&headers);
    state.attachment_service.remove(&id, client_id.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Per-client incremental manifest anchored to the shared sync counter.
pub async fn manifest(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<ManifestRequest>,
) -> Result<Json<ManifestResponse>> {
    auth_user.require(Role::ReadOnly)?;

    Ok(Json(state.attachment_service.manifest(&body.client_id, body.since_version).await?))
}
