//! Submission constraints for `POST /api/v1/jobs/submit` (spec §4.9, §6):
//! file extension, upload size, and document URL scheme.

use thiserror::Error;

const ALLOWED_EXTENSIONS: &[&str] = &["docx", "pdf"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitValidationError {
    #[error("exactly one of document or documentUrl must be provided")]
    NeitherOrBothSources,

    #[error("file extension must be one of .docx, .pdf")]
    UnsupportedExtension,

    #[error("File size exceeds 50MB limit")]
    FileTooLarge,

    #[error("documentUrl must be an absolute http or https URL")]
    InvalidUrl,
}

/// `document.length <= 50 * 2^20` (spec §6).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn validate_file_name(file_name: &str) -> Result<(), SubmitValidationError> {
    let ext = file_name
        .rsplit('.')
        .next()
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(SubmitValidationError::UnsupportedExtension)
    }
}

pub fn validate_file_size(size: usize, max_bytes: usize) -> Result<(), SubmitValidationError> {
    if size > max_bytes {
        Err(SubmitValidationError::FileTooLarge)
    } else {
        Ok(())
    }
}

/// Absolute http/https URL (spec §6 "URL must parse absolute http/https").
pub fn validate_document_url(url: &str) -> Result<(), SubmitValidationError> {
    match reqwest::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        _ => Err(SubmitValidationError::InvalidUrl),
    }
}
