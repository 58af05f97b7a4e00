//! Shared record types, status enum, and topic/key naming conventions used
//! across every stage of the pipeline (gateway, workers, renderer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable topic names. Kept as constants rather than an enum so the queue
/// layer can treat them as opaque strings (spec §3, §6).
pub mod topics {
    pub const JOB_REQUESTS: &str = "job-requests";
    pub const PARSING_JOBS: &str = "parsing-jobs";
    pub const ANALYSIS_JOBS: &str = "analysis-jobs";
}

/// Object-store key builders. Backend-neutral: both the local and cloud
/// implementations use the same layout (spec §6).
pub mod keys {
    pub fn document(job_id: &str, file_name: &str) -> String {
        format!("documents/{job_id}/{file_name}")
    }

    pub fn parse_result(job_id: &str) -> String {
        format!("parsed/{job_id}/parse-result.json")
    }

    pub fn image(job_id: &str, asset_id: &str, ext: &str) -> String {
        format!("images/{job_id}/{asset_id}.{ext}")
    }

    pub fn template_json(job_id: &str) -> String {
        format!("results/{job_id}/template.json")
    }

    pub fn context_json(job_id: &str) -> String {
        format!("results/{job_id}/context.json")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DocumentType {
    Docx,
    Pdf,
    GoogleDoc,
}

/// Identity of a submission (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRequest {
    pub job_id: String,
    pub document_type: DocumentType,
    /// Object-store key of uploaded bytes. Exactly one of `file_path` /
    /// `document_url` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Absolute http/https URL to a Google-Docs-style document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobRequest {
    pub fn validate_shape(&self) -> Result<(), &'static str> {
        match (&self.file_path, &self.document_url) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err("exactly one of file_path/document_url must be set, got both"),
            (None, None) => Err("exactly one of file_path/document_url must be set, got neither"),
        }
    }
}

/// Total order for terminal-monotonicity; transitions form a DAG, enforced
/// by worker code rather than the store (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobStatus {
    Pending,
    Processing,
    ParsingInProgress,
    AnalysisInProgress,
    Complete,
    Failed,
}

impl JobStatus {
    /// Edges of the state DAG in §4.2. `Failed` is reachable from any
    /// non-terminal state; `Complete`/`Failed` are absorbing.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Complete, Complete) | (Failed, Failed) => true,
            (Complete, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Pending, Processing) => true,
            (Processing, ParsingInProgress) => true,
            (ParsingInProgress, AnalysisInProgress) => true,
            (AnalysisInProgress, Complete) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Per-job mutable row; the single source of truth for job state (spec §3,
/// §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobStatusRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub status_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_json_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_json_key: Option<String>,
}

impl JobStatusRecord {
    pub fn new(job_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            status_message: "Job accepted".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            template_json_key: None,
            context_json_key: None,
        }
    }
}

/// Hand-off from parser to analyzer (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisJob {
    pub job_id: String,
    pub parse_result_key: String,
    pub document_type: DocumentType,
}

/// A single extracted content block (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentSection {
    pub placeholder_id: String,
    pub section_title: String,
    pub sample_text: String,
    pub word_count: usize,
}

/// Stored as JSON at `parsed/{jobId}/parse-result.json` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParseResult {
    pub template_json: TemplateJson,
    pub content_sections: Vec<ContentSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Section {
    pub section_title: String,
    pub placeholder_id: String,
    #[serde(default)]
    pub sub_sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SectionHierarchy {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayoutRules {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub orientation: Orientation,
    pub margins: Margins,
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            orientation: Orientation::Portrait,
            margins: Margins {
                top: 25.4,
                bottom: 25.4,
                left: 25.4,
                right: 25.4,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedColor {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "HexCode")]
    pub hex_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FontDefinition {
    pub family: String,
    pub size_pt: f64,
    pub weight: FontWeight,
    pub color: String,
}

impl Default for FontDefinition {
    fn default() -> Self {
        Self {
            family: "Calibri".to_string(),
            size_pt: 11.0,
            weight: FontWeight::Normal,
            color: "000000".to_string(),
        }
    }
}

/// Case-insensitive keys: always looked up via `font_map::get`.
pub type FontMap = BTreeMap<String, FontDefinition>;

pub mod font_map {
    use super::{FontDefinition, FontMap};

    pub fn get<'a>(map: &'a FontMap, key: &str) -> Option<&'a FontDefinition> {
        let key = key.to_lowercase();
        map.iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v)
    }

    pub fn insert(map: &mut FontMap, key: impl Into<String>, def: FontDefinition) {
        map.insert(key.into(), def);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VisualTheme {
    pub color_palette: Vec<NamedColor>,
    pub font_map: FontMap,
    pub layout_rules: LayoutRules,
}

impl Default for VisualTheme {
    fn default() -> Self {
        Self {
            color_palette: Vec::new(),
            font_map: FontMap::new(),
            layout_rules: LayoutRules::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Logo,
    Image,
    Watermark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogoAsset {
    pub asset_id: String,
    pub asset_type: AssetType,
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateJson {
    pub visual_theme: VisualTheme,
    pub section_hierarchy: SectionHierarchy,
    pub logo_map: Vec<LogoAsset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Formal,
    Informal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinguisticStyle {
    pub overall_formality: Formality,
    pub formality_confidence_score: f64,
    pub dominant_tone: Tone,
    pub tone_confidence_score: f64,
    pub writing_style_vector: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentBlock {
    pub placeholder_id: String,
    pub section_sample_text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextJson {
    pub linguistic_style: LinguisticStyle,
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_metadata: Option<serde_json::Value>,
}
