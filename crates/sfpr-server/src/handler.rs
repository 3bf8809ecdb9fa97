//! Request handlers.
//!
//! Registry calls take locks and touch the disk, so anything that writes
//! runs on the blocking pool.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use sfpr_registry::{
    Adjudication, IntakeOutcome, IntakeRequest, Registry, RegistryResult, SubmissionId,
};
use sfpr_types::Digest;

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Registry) -> RegistryResult<T> + Send + 'static,
{
    let registry = state.registry.clone();
    Ok(tokio::task::spawn_blocking(move || f(&registry)).await??)
}

fn parse_submission_id(raw: &str) -> Result<SubmissionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("unknown submission: {raw}")))
}

/// Submission payload: metadata plus the image, base64-encoded.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub metadata: Value,
    pub eeprom_data_base64: String,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

/// Optional body for approve and reject.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjudicateBody {
    pub ruling: Adjudication,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub version: Option<u64>,
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = blocking(&state, |r| r.stats()).await?;
    Ok(Json(json!({
        "name": "sfpr-server",
        "version": env!("CARGO_PKG_VERSION"),
        "stats": stats,
    })))
}

/// `POST /v1/submissions`
pub async fn submit_handler(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Result<Response, ApiError> {
    let blob = STANDARD
        .decode(body.eeprom_data_base64.trim())
        .map_err(|e| ApiError::bad_request(format!("eeprom_data_base64 is not valid base64: {e}")))?;
    let request = IntakeRequest {
        metadata: body.metadata,
        blob,
        submitted_by: body.submitted_by,
    };

    let receipt = blocking(&state, move |r| r.submit(request)).await?;
    let status = match receipt.outcome {
        IntakeOutcome::Queued { .. } => StatusCode::CREATED,
        IntakeOutcome::Duplicate { .. } => StatusCode::OK,
        IntakeOutcome::Conflict { .. } => StatusCode::ACCEPTED,
        IntakeOutcome::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
    };
    Ok((status, Json(receipt)).into_response())
}

pub async fn list_submissions_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let submissions = blocking(&state, |r| r.submissions()).await?;
    Ok(Json(json!({
        "total": submissions.len(),
        "submissions": submissions,
    }))
    .into_response())
}

pub async fn get_submission_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_submission_id(&id)?;
    let submission = blocking(&state, move |r| r.submission(&id)).await?;
    Ok(Json(submission).into_response())
}

pub async fn approve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> Result<Response, ApiError> {
    let id = parse_submission_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let submission = blocking(&state, move |r| r.approve(&id, body.actor.as_deref())).await?;
    Ok(Json(submission).into_response())
}

pub async fn reject_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> Result<Response, ApiError> {
    let id = parse_submission_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let submission = blocking(&state, move |r| {
        let reason = body.reason.as_deref().unwrap_or("rejected by maintainer");
        r.reject(&id, body.actor.as_deref(), reason)
    })
    .await?;
    Ok(Json(submission).into_response())
}

pub async fn adjudicate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AdjudicateBody>,
) -> Result<Response, ApiError> {
    let id = parse_submission_id(&id)?;
    let submission = blocking(&state, move |r| {
        r.adjudicate(&id, body.ruling, body.actor.as_deref(), body.reason.as_deref())
    })
    .await?;
    Ok(Json(submission).into_response())
}

pub async fn conflicts_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let conflicts = blocking(&state, |r| r.conflicts()).await?;
    Ok(Json(json!({
        "total": conflicts.len(),
        "conflicts": conflicts,
    }))
    .into_response())
}

/// `POST /v1/publish`
pub async fn publish_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = blocking(&state, |r| r.publish()).await?;
    Ok(Json(report).into_response())
}

/// `GET /v1/index.json`, optionally `?version=N` for an archived version.
pub async fn index_handler(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> Result<Response, ApiError> {
    match query.version {
        None => {
            let index = state.registry.index()?;
            Ok(Json(index.as_ref()).into_response())
        }
        Some(version) => {
            let snapshot = blocking(&state, move |r| r.index_version(version))
                .await?
                .ok_or_else(|| ApiError::not_found(format!("index version {version} not available")))?;
            Ok(Json(snapshot).into_response())
        }
    }
}

/// `GET /v1/blobs/<sha256>.bin`
pub async fn blob_handler(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let digest = Digest::from_blob_file_name(&file)
        .map_err(|_| ApiError::not_found(format!("no such blob: {file}")))?;
    let data = blocking(&state, move |r| r.blob(&digest)).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes::Bytes::from(data),
    )
        .into_response())
}
