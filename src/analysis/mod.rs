//! Analysis stage orchestration (C7, spec §4.4.3): linguistic-style
//! scoring over concatenated content, logo/image reclassification via the
//! CV heuristic, and assembly of the final `TemplateJson`/`ContextJson`
//! pair.

pub mod image_classifier;
pub mod linguistic;

use crate::model::{ContentBlock, ContextJson, ParseResult, TemplateJson};
use crate::storage::DocumentStore;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// A 12-hour pre-signed URL lifetime for reclassified logo assets (spec
/// §4.7 "a freshly generated 12-hour pre-signed URL").
const LOGO_URL_TTL: Duration = Duration::from_secs(12 * 3600);

/// Runs the full analysis stage over a parsed document, producing the
/// final result pair stored at `results/{jobId}/{template,context}.json`.
pub async fn analyze(
    job_id: &str,
    parse_result: ParseResult,
    store: &dyn DocumentStore,
) -> Result<(TemplateJson, ContextJson)> {
    let ParseResult {
        mut template_json,
        content_sections,
    } = parse_result;

    let sample_text = content_sections
        .iter()
        .map(|s| s.sample_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let linguistic_style = linguistic::analyze(&sample_text);

    for asset in template_json.logo_map.iter_mut() {
        let Some(storage_key) = asset.storage_key.clone() else {
            continue;
        };

        let classification = match store.download(&storage_key).await {
            Ok(bytes) => image_classifier::classify(&bytes),
            Err(e) => {
                tracing::warn!(job_id, asset_id = %asset.asset_id, error = %e, "failed to download logo asset for classification");
                None
            }
        };
        asset.asset_type = image_classifier::refine_asset_type(asset.asset_type, classification);

        match store.presigned_url(&storage_key, LOGO_URL_TTL).await {
            Ok(url) => asset.secure_url = Some(url),
            Err(e) => {
                tracing::warn!(job_id, asset_id = %asset.asset_id, error = %e, "failed to sign logo asset URL");
            }
        }
    }

    let content_blocks = content_sections
        .into_iter()
        .map(|section| ContentBlock {
            placeholder_id: section.placeholder_id,
            section_sample_text: section.sample_text,
            word_count: section.word_count,
        })
        .collect();

    let context_json = ContextJson {
        linguistic_style,
        content_blocks,
        administrative_metadata: None,
    };

    Ok((template_json, context_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AssetType, BoundingBox, ContentSection, LogoAsset, SectionHierarchy, VisualTheme,
    };
    use crate::storage::local::LocalObjectStore;

    #[tokio::test]
    async fn analysis_fills_linguistic_style_and_content_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080").unwrap();

        let parse_result = ParseResult {
            template_json: TemplateJson {
                visual_theme: VisualTheme::default(),
                section_hierarchy: SectionHierarchy { sections: Vec::new() },
                logo_map: Vec::new(),
            },
            content_sections: vec![ContentSection {
                placeholder_id: "placeholder_section_1".to_string(),
                section_title: "Summary".to_string(),
                sample_text: "This is a formal and neutral sentence about the quarter.".to_string(),
                word_count: 10,
            }],
        };

        let (_template, context) = analyze("job-1", parse_result, &store).await.unwrap();
        assert_eq!(context.content_blocks.len(), 1);
        assert_eq!(context.content_blocks[0].placeholder_id, "placeholder_section_1");
    }

    #[tokio::test]
    async fn logos_without_storage_key_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080").unwrap();

        let parse_result = ParseResult {
            template_json: TemplateJson {
                visual_theme: VisualTheme::default(),
                section_hierarchy: SectionHierarchy { sections: Vec::new() },
                logo_map: vec![LogoAsset {
                    asset_id: "asset_job-1_0".to_string(),
                    asset_type: AssetType::Image,
                    bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 100.0, height: 100.0, page_number: 1 },
                    secure_url: None,
                    storage_key: None,
                }],
            },
            content_sections: Vec::new(),
        };

        let (template, _context) = analyze("job-1", parse_result, &store).await.unwrap();
        assert_eq!(template.logo_map[0].secure_url, None);
        assert_eq!(template.logo_map[0].asset_type, AssetType::Image);
    }
}
