//! Format dispatch + DOCX structural analyzer (C6). The DOCX/PDF/GoogleDoc
//! handler triad is a closed tagged union over `DocumentType` resolving to
//! an implementation of `DocumentHandler` (spec §9 "dynamic dispatch ->
//! closed tagged union"), mirroring the teacher's `HandlerRegistry`
//! lookup-table shape in the now-removed `handlers/registry.rs`.

pub mod docx;
pub mod google_doc;
pub mod pdf;

use crate::model::{DocumentType, ParseResult};
use crate::storage::DocumentStore;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("http error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Stateless apart from per-call buffers; no shared mutable state (spec §9).
#[async_trait]
pub trait DocumentHandler: Send + Sync {
    async fn parse(
        &self,
        job_id: &str,
        input: ParseInput,
        store: &dyn DocumentStore,
    ) -> Result<ParseResult>;
}

/// What a handler is given to parse: either the raw bytes of an uploaded
/// file, or a remote URL to fetch (Google Docs export).
pub enum ParseInput {
    Bytes(Vec<u8>),
    Url(String),
}

/// Constant lookup table resolving `DocumentType` to its handler (spec §9).
pub fn handler_for(document_type: DocumentType) -> &'static dyn DocumentHandler {
    match document_type {
        DocumentType::Docx => &docx::DocxHandler,
        DocumentType::Pdf => &pdf::PdfHandler,
        DocumentType::GoogleDoc => &google_doc::GoogleDocHandler,
    }
}
