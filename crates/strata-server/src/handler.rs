//! Registry API handlers.
//!
//! Handlers translate between HTTP and the [`Registry`] facade. Every
//! lookup is answered from the ledger (or the consistency cache); nothing
//! is stored here.
//!
//! [`Registry`]: strata_registry::Registry

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use strata_registry::names::parse_digest;
use strata_registry::{Reference, UploadSession};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

pub const API_VERSION_HEADER: &str = "docker-distribution-api-version";
pub const CONTENT_DIGEST_HEADER: &str = "docker-content-digest";
pub const UPLOAD_UUID_HEADER: &str = "docker-upload-uuid";

#[derive(Debug, Deserialize)]
pub struct ManifestPath {
    pub org: String,
    pub artifact: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct BlobPath {
    pub org: String,
    pub artifact: String,
    pub digest: String,
}

#[derive(Debug, Deserialize)]
pub struct RepoPath {
    pub org: String,
    pub artifact: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadPath {
    pub org: String,
    pub artifact: String,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DigestQuery {
    pub digest: Option<String>,
}

impl DigestQuery {
    fn required(&self) -> ServerResult<strata_types::Digest> {
        let raw = self.digest.as_deref().ok_or(ServerError::MissingDigest)?;
        Ok(parse_digest(raw)?)
    }
}

/// `GET /v2/`: API version check.
pub async fn version() -> impl IntoResponse {
    ([(API_VERSION_HEADER, "registry/2.0")], Json(json!({})))
}

/// `HEAD /v2/{org}/{artifact}/manifests/{reference}`
pub async fn head_manifest(
    State(state): State<AppState>,
    Path(p): Path<ManifestPath>,
) -> ServerResult<Response> {
    let reference = Reference::parse(&p.reference)?;
    let digest = state
        .registry
        .manifest_digest(&p.org, &p.artifact, &reference)
        .await?
        .ok_or_else(|| ServerError::ManifestUnknown(p.reference.clone()))?;
    Ok((StatusCode::OK, [(CONTENT_DIGEST_HEADER, digest.to_string())]).into_response())
}

/// `GET /v2/{org}/{artifact}/manifests/{reference}`: redirect to the body.
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(p): Path<ManifestPath>,
) -> ServerResult<Response> {
    let reference = Reference::parse(&p.reference)?;
    let locator = state
        .registry
        .locate_manifest(&p.org, &p.artifact, &reference)
        .await?
        .ok_or_else(|| ServerError::ManifestUnknown(p.reference.clone()))?;
    Ok((StatusCode::TEMPORARY_REDIRECT, [("location", locator.url)]).into_response())
}

/// `PUT /v2/{org}/{artifact}/manifests/{reference}`
pub async fn put_manifest(
    State(state): State<AppState>,
    Path(p): Path<ManifestPath>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let reference = Reference::parse(&p.reference)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let digest = state
        .registry
        .push_manifest(&p.org, &p.artifact, &reference, body, content_type)
        .await?;
    let location = format!("/v2/{}/{}/manifests/{digest}", p.org, p.artifact);
    Ok((
        StatusCode::CREATED,
        [
            (CONTENT_DIGEST_HEADER, digest.to_string()),
            ("location", location),
        ],
    )
        .into_response())
}

/// `HEAD /v2/{org}/{artifact}/blobs/{digest}`
pub async fn head_blob(
    State(state): State<AppState>,
    Path(p): Path<BlobPath>,
) -> ServerResult<Response> {
    let digest = parse_digest(&p.digest)?;
    if !state
        .registry
        .blob_exists(&p.org, &p.artifact, &digest)
        .await?
    {
        return Err(ServerError::BlobUnknown(p.digest));
    }
    Ok((StatusCode::OK, [(CONTENT_DIGEST_HEADER, digest.to_string())]).into_response())
}

/// `GET /v2/{org}/{artifact}/blobs/{digest}`: redirect to the body.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(p): Path<BlobPath>,
) -> ServerResult<Response> {
    let digest = parse_digest(&p.digest)?;
    let locator = state
        .registry
        .locate_blob(&p.org, &p.artifact, &digest)
        .await?
        .ok_or_else(|| ServerError::BlobUnknown(p.digest.clone()))?;
    Ok((
        StatusCode::TEMPORARY_REDIRECT,
        [
            ("location", locator.url),
            (CONTENT_DIGEST_HEADER, digest.to_string()),
        ],
    )
        .into_response())
}

/// `POST /v2/{org}/{artifact}/blobs/uploads/`
///
/// With `?digest=` the body is the whole blob and the upload completes at
/// once. Otherwise a session is opened for chunked upload.
pub async fn start_upload(
    State(state): State<AppState>,
    Path(p): Path<RepoPath>,
    Query(query): Query<DigestQuery>,
    body: Bytes,
) -> ServerResult<Response> {
    let staging = state.registry.staging();
    if query.digest.is_some() {
        let digest = query.required()?;
        let handle = staging
            .monolithic(&p.org, &p.artifact, &body, digest.clone())
            .await?;
        drop(handle);
        return Ok(blob_created(&p.org, &p.artifact, &digest));
    }

    let session = staging.initiate(&p.org, &p.artifact).await?;
    Ok(upload_accepted(StatusCode::ACCEPTED, &session))
}

/// `PATCH /v2/{org}/{artifact}/blobs/uploads/{id}`
pub async fn patch_upload(
    State(state): State<AppState>,
    Path(p): Path<UploadPath>,
    body: Bytes,
) -> ServerResult<Response> {
    let session = state
        .registry
        .staging()
        .append(&p.org, &p.artifact, &p.id, &body)
        .await?;
    Ok(upload_accepted(StatusCode::ACCEPTED, &session))
}

/// `PUT /v2/{org}/{artifact}/blobs/uploads/{id}?digest=`
///
/// Responds as soon as publication has been handed to the background.
pub async fn put_upload(
    State(state): State<AppState>,
    Path(p): Path<UploadPath>,
    Query(query): Query<DigestQuery>,
    body: Bytes,
) -> ServerResult<Response> {
    let digest = query.required()?;
    let handle = state
        .registry
        .staging()
        .finalize(&p.org, &p.artifact, &p.id, &body, digest.clone())
        .await?;
    drop(handle);
    Ok(blob_created(&p.org, &p.artifact, &digest))
}

/// `GET /v2/{org}/{artifact}/blobs/uploads/{id}`
pub async fn upload_status(
    State(state): State<AppState>,
    Path(p): Path<UploadPath>,
) -> ServerResult<Response> {
    let session = state
        .registry
        .staging()
        .status(&p.org, &p.artifact, &p.id)
        .await?;
    Ok((
        StatusCode::NO_CONTENT,
        [
            ("range", session.range()),
            (UPLOAD_UUID_HEADER, session.id.to_string()),
        ],
    )
        .into_response())
}

/// `DELETE /v2/{org}/{artifact}/blobs/uploads/{id}`
pub async fn cancel_upload(
    State(state): State<AppState>,
    Path(p): Path<UploadPath>,
) -> ServerResult<StatusCode> {
    state
        .registry
        .staging()
        .cancel(&p.org, &p.artifact, &p.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn upload_accepted(status: StatusCode, session: &UploadSession) -> Response {
    let location = format!(
        "/v2/{}/{}/blobs/uploads/{}",
        session.org,
        session.artifact,
        session.id.simple()
    );
    (
        status,
        [
            ("location", location),
            ("range", session.range()),
            (UPLOAD_UUID_HEADER, session.id.to_string()),
        ],
    )
        .into_response()
}

fn blob_created(org: &str, artifact: &str, digest: &strata_types::Digest) -> Response {
    (
        StatusCode::CREATED,
        [
            ("location", format!("/v2/{org}/{artifact}/blobs/{digest}")),
            (CONTENT_DIGEST_HEADER, digest.to_string()),
        ],
    )
        .into_response()
}
