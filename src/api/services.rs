//! Gateway adapter request handlers (C9, spec §4.9, §6). Thin by design:
//! validate, stage bytes into the object store, create the status record,
//! publish the first pipeline message, and otherwise just proxy status/
//! result lookups to the ledger and object store.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

use super::{
    models::{
        FileQuery, HealthResponse, JobResultsPendingResponse, JobResultsResponse, ResultsQuery,
        SubmitResponse,
    },
    state::AppState,
    utils, validation,
};
use crate::api::error::ApiError;
use crate::model::{self, DocumentType, JobRequest, JobStatus};

/// `POST /api/v1/jobs/submit` (spec §6, §4.9).
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    utils::check_api_key(&headers, state.config.server.api_key.as_deref())?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut document_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidPayload(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "document" => {
                let name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidPayload(format!("failed to read document field: {e}")))?;
                file_name = name;
                file_bytes = Some(bytes.to_vec());
            }
            "documentUrl" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidPayload(format!("failed to read documentUrl field: {e}")))?;
                if !text.trim().is_empty() {
                    document_url = Some(text);
                }
            }
            _ => {}
        }
    }

    match (file_bytes, document_url) {
        (Some(_), Some(_)) | (None, None) => Err(ApiError::InvalidPayload(
            "exactly one of document or documentUrl must be provided".to_string(),
        )),
        (Some(bytes), None) => {
            let name = file_name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ApiError::InvalidPayload("document field is missing a filename".to_string()))?;
            validation::validate_file_name(&name).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
            validation::validate_file_size(bytes.len(), state.config.server.max_upload_bytes.as_u64() as usize)
                .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

            let document_type = if name.to_lowercase().ends_with(".pdf") {
                DocumentType::Pdf
            } else {
                DocumentType::Docx
            };

            let job_id = Uuid::new_v4().to_string();
            let key = model::keys::document(&job_id, &name);
            state
                .store
                .upload(&key, bytes, content_type_for(&name))
                .await
                .map_err(|e| ApiError::Internal(format!("upload failed: {e}")))?;

            finish_submission(state, job_id, document_type, Some(key), Some(name), None).await
        }
        (None, Some(url)) => {
            validation::validate_document_url(&url).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
            let job_id = Uuid::new_v4().to_string();
            finish_submission(state, job_id, DocumentType::GoogleDoc, None, None, Some(url)).await
        }
    }
}

async fn finish_submission(
    state: AppState,
    job_id: String,
    document_type: DocumentType,
    file_path: Option<String>,
    file_name: Option<String>,
    document_url: Option<String>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    state
        .ledger
        .create(&job_id)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create job status record: {e}")))?;

    let request = JobRequest {
        job_id: job_id.clone(),
        document_type,
        file_path,
        document_url,
        file_name,
        created_at: Utc::now(),
    };
    request
        .validate_shape()
        .map_err(|e| ApiError::Internal(format!("invalid job request shape: {e}")))?;

    let payload = serde_json::to_vec(&request)?;
    state
        .bus
        .publish(model::topics::JOB_REQUESTS, &payload)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to publish job request: {e}")))?;

    state.metrics.job_submitted();

    let status_url = format!(
        "{}/api/v1/jobs/{}/status",
        state.config.server.gateway_base_url.trim_end_matches('/'),
        job_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse { job_id, status_url }),
    ))
}

/// `GET /api/v1/jobs/{jobId}/status` (spec §6).
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .ledger
        .get(&job_id)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to read job status: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id} not found")))?;

    Ok((StatusCode::OK, Json(record)))
}

/// `GET /api/v1/jobs/{jobId}/results?includeContent=bool` (spec §6).
pub async fn get_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<axum::response::Response, ApiError> {
    let record = state
        .ledger
        .get(&job_id)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to read job status: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id} not found")))?;

    if record.status != JobStatus::Complete {
        let body = JobResultsPendingResponse {
            message: record.status_message,
            status: record.status,
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    let template_key = record
        .template_json_key
        .ok_or_else(|| ApiError::Internal("completed job is missing its template key".to_string()))?;
    let context_key = record
        .context_json_key
        .ok_or_else(|| ApiError::Internal("completed job is missing its context key".to_string()))?;

    let ttl = Duration::from_secs(3600);
    let template_json_url = state
        .store
        .presigned_url(&template_key, ttl)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to sign template URL: {e}")))?;
    let context_json_url = state
        .store
        .presigned_url(&context_key, ttl)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to sign context URL: {e}")))?;

    let (template_json, context_json) = if query.include_content {
        let template_bytes = state
            .store
            .download(&template_key)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to read template.json: {e}")))?;
        let context_bytes = state
            .store
            .download(&context_key)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to read context.json: {e}")))?;
        (
            Some(serde_json::from_slice(&template_bytes)?),
            Some(serde_json::from_slice(&context_bytes)?),
        )
    } else {
        (None, None)
    };

    let body = JobResultsResponse {
        job_id,
        template_json_url,
        context_json_url,
        template_json,
        context_json,
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `GET /api/v1/jobs/files/{*fileKey}?download=bool` (spec §6).
pub async fn get_file(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<axum::response::Response, ApiError> {
    let key = utils::decode_file_key(&raw_key)?;
    let bytes = match state.store.download(&key).await {
        Ok(bytes) => bytes,
        Err(crate::storage::StorageError::NotFound(_)) => {
            return Err(ApiError::NotFound(format!("file {key} not found")));
        }
        Err(e) => return Err(ApiError::Internal(format!("failed to read {key}: {e}"))),
    };

    let content_type = content_type_for(&key);
    let disposition = if query.download {
        format!(
            "attachment; filename=\"{}\"",
            key.rsplit('/').next().unwrap_or(&key)
        )
    } else {
        "inline".to_string()
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "json" => "application/json",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// `GET /health` — process-local liveness, kept from the teacher's
/// `api/services.rs::health`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("object_store".to_string(), "healthy".to_string());
    components.insert("job_status_store".to_string(), "healthy".to_string());
    components.insert("message_bus".to_string(), "healthy".to_string());

    let snapshot = state.metrics.snapshot();
    tracing::debug!(?snapshot, "health check");

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}
