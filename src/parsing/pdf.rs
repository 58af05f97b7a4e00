//! PDF handler: a thin, page-oriented wrapper over `pdf-extract` (spec
//! §4.4.2). PDF carries none of DOCX's style metadata, so the visual theme
//! it reports is the spec's documented default and font enumeration is
//! best-effort only (the crate does not expose per-glyph font metadata).

use crate::model::{
    ContentSection, ParseResult, Section, SectionHierarchy, TemplateJson, VisualTheme,
};
use crate::parsing::{DocumentHandler, ParseError, ParseInput, Result};
use crate::storage::DocumentStore;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

const SAMPLE_TEXT_CAP: usize = 600;

pub struct PdfHandler;

#[async_trait]
impl DocumentHandler for PdfHandler {
    async fn parse(
        &self,
        _job_id: &str,
        input: ParseInput,
        _store: &dyn DocumentStore,
    ) -> Result<ParseResult> {
        let bytes = match input {
            ParseInput::Bytes(b) => b,
            ParseInput::Url(_) => {
                return Err(ParseError::MalformedDocument(
                    "pdf handler requires bytes, not a URL".to_string(),
                ))
            }
        };

        let pages = pdf_extract::extract_text_by_pages_from_mem(&bytes)
            .map_err(|e| ParseError::MalformedDocument(format!("failed to extract PDF text: {e}")))?;

        if pages.is_empty() {
            return Err(ParseError::MalformedDocument("PDF has no pages".to_string()));
        }

        let mut sections = Vec::with_capacity(pages.len());
        let mut content_sections = Vec::with_capacity(pages.len());

        for (i, page_text) in pages.iter().enumerate() {
            let page_number = i + 1;
            let section_title = format!("Page {page_number}");
            let placeholder_id = format!("placeholder_page_{page_number}");
            let sample_text = cap_chars(page_text.trim(), SAMPLE_TEXT_CAP);

            sections.push(Section {
                section_title: section_title.clone(),
                placeholder_id: placeholder_id.clone(),
                sub_sections: Vec::new(),
            });
            content_sections.push(ContentSection {
                placeholder_id,
                section_title,
                word_count: word_count(&sample_text),
                sample_text,
            });
        }

        Ok(ParseResult {
            template_json: TemplateJson {
                visual_theme: VisualTheme::default(),
                section_hierarchy: SectionHierarchy { sections },
                logo_map: Vec::new(),
            },
            content_sections,
        })
    }
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn word_count(text: &str) -> usize {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = WORD_RE.get_or_init(|| Regex::new(r"\b\w+\b").unwrap());
    re.find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_sample_text_at_600_characters() {
        let long = "a".repeat(1000);
        let capped = cap_chars(&long, SAMPLE_TEXT_CAP);
        assert_eq!(capped.chars().count(), SAMPLE_TEXT_CAP);
    }

    #[test]
    fn short_text_is_unchanged() {
        let short = "a short page of text";
        assert_eq!(cap_chars(short, SAMPLE_TEXT_CAP), short);
    }
}
