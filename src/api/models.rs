//! API request/response models for the gateway adapter (C9, spec §6).

use crate::model::JobStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `POST /api/v1/jobs/submit` — 202 response. Field casing follows the
/// spec's literal `{jobId, statusUrl}` example (spec §6), distinct from
/// the PascalCase convention used by the pipeline's own data model types.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status_url: String,
}

/// `GET /api/v1/jobs/{jobId}/results?includeContent=bool` query
/// parameters (spec §6).
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    #[serde(default)]
    pub include_content: bool,
}

/// `GET /api/v1/jobs/{jobId}/results` — 200 response once `Complete`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JobResultsResponse {
    pub job_id: String,
    pub template_json_url: String,
    pub context_json_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_json: Option<serde_json::Value>,
}

/// `GET /api/v1/jobs/{jobId}/results` — 202 response while not yet
/// `Complete`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobResultsPendingResponse {
    pub message: String,
    pub status: JobStatus,
}

/// `GET /api/v1/jobs/files/{*fileKey}` query parameters.
#[derive(Debug, Deserialize, Default)]
pub struct FileQuery {
    #[serde(default)]
    pub download: bool,
}

/// Matches the exact shape used by the spec's documented error bodies
/// (e.g. `{"error":"File size exceeds 50MB limit"}`, spec §8 scenario 5).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
