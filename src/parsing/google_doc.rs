//! Google Docs handler: fetches the public HTML export and rebuilds a
//! section hierarchy from its `<h1>`..`<h4>` headings (spec §4.4.2). HTML
//! parsing is grounded on `examples/criticalinsight-sly`'s use of
//! `scraper`; the HTTP fetch reuses the teacher's `reqwest` dependency.

use crate::model::{
    BoundingBox, ContentSection, LogoAsset, AssetType, ParseResult, Section, SectionHierarchy,
    TemplateJson, VisualTheme,
};
use crate::parsing::{DocumentHandler, ParseError, ParseInput, Result};
use crate::storage::DocumentStore;
use async_trait::async_trait;
use base64::Engine;
use ego_tree::NodeRef;
use regex::Regex;
use scraper::{Html, Node};
use std::sync::OnceLock;

pub struct GoogleDocHandler;

#[async_trait]
impl DocumentHandler for GoogleDocHandler {
    async fn parse(
        &self,
        job_id: &str,
        input: ParseInput,
        store: &dyn DocumentStore,
    ) -> Result<ParseResult> {
        let url = match input {
            ParseInput::Url(url) => url,
            ParseInput::Bytes(_) => {
                return Err(ParseError::MalformedDocument(
                    "google doc handler requires a URL, not bytes".to_string(),
                ))
            }
        };

        let doc_id = extract_doc_id(&url)
            .ok_or_else(|| ParseError::MalformedDocument(format!("not a Google Docs URL: {url}")))?;
        let export_url = format!("https://docs.google.com/document/d/{doc_id}/export?format=html");

        let html = reqwest::get(&export_url)
            .await
            .map_err(|e| ParseError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ParseError::Http(e.to_string()))?
            .text()
            .await
            .map_err(|e| ParseError::Http(e.to_string()))?;

        let document = Html::parse_document(&html);
        let elements = collect_elements(&document);

        let (section_hierarchy, content_sections) = build_tree(&elements);
        let logo_map = extract_images(job_id, &elements, store).await?;

        Ok(ParseResult {
            template_json: TemplateJson {
                visual_theme: VisualTheme::default(),
                section_hierarchy,
                logo_map,
            },
            content_sections,
        })
    }
}

fn extract_doc_id(url: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap());
    re.captures(url).map(|c| c[1].to_string())
}

enum DocElement {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Image { src: String, width: Option<f64>, height: Option<f64> },
}

/// Walks the parsed document in source order, pulling out the handful of
/// tags the spec cares about (`h1`-`h4`, `p`, `img`); everything else
/// (Google's layout `<span>`/`<div>` wrappers) is transparent.
fn collect_elements(document: &Html) -> Vec<DocElement> {
    let mut out = Vec::new();
    visit(document.tree.root(), &mut out);
    out
}

fn visit(node: NodeRef<Node>, out: &mut Vec<DocElement>) {
    if let Node::Element(el) = node.value() {
        let tag = el.name();
        match tag {
            "h1" | "h2" | "h3" | "h4" => {
                let level = tag[1..].parse::<u8>().unwrap_or(1);
                let text = element_text(node);
                if !text.trim().is_empty() {
                    out.push(DocElement::Heading { level, text: text.trim().to_string() });
                }
                return;
            }
            "p" => {
                let text = element_text(node);
                if !text.trim().is_empty() {
                    out.push(DocElement::Paragraph { text: text.trim().to_string() });
                }
                return;
            }
            "img" => {
                if let Some(src) = el.attr("src") {
                    let width = el.attr("width").and_then(|v| v.parse::<f64>().ok());
                    let height = el.attr("height").and_then(|v| v.parse::<f64>().ok());
                    out.push(DocElement::Image {
                        src: src.to_string(),
                        width,
                        height,
                    });
                }
                return;
            }
            _ => {}
        }
    }
    for child in node.children() {
        visit(child, out);
    }
}

fn element_text(node: NodeRef<Node>) -> String {
    let mut text = String::new();
    for descendant in node.descendants() {
        if let Node::Text(t) = descendant.value() {
            text.push_str(t);
        }
    }
    text
}

struct Frame {
    section: Section,
    level: u8,
    buffer: String,
}

fn normalize_heading_text(text: &str) -> String {
    text.trim().trim_end_matches([':', '-', '–']).trim().to_string()
}

fn word_count(text: &str) -> usize {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = WORD_RE.get_or_init(|| Regex::new(r"\b\w+\b").unwrap());
    re.find_iter(text).count()
}

fn build_tree(elements: &[DocElement]) -> (SectionHierarchy, Vec<ContentSection>) {
    let mut stack: Vec<Frame> = Vec::new();
    let mut roots: Vec<Section> = Vec::new();
    let mut content_sections: Vec<ContentSection> = Vec::new();
    let mut counter = 0usize;

    for element in elements {
        match element {
            DocElement::Heading { level, text } => {
                let level = (*level).clamp(1, 6);
                while let Some(top) = stack.last() {
                    if top.level >= level {
                        let frame = stack.pop().unwrap();
                        finish_frame(&mut stack, &mut roots, &mut content_sections, frame);
                    } else {
                        break;
                    }
                }
                counter += 1;
                let placeholder_id = if level == 1 {
                    format!("placeholder_section_{counter}")
                } else {
                    format!("placeholder_subsection_{counter}")
                };
                stack.push(Frame {
                    section: Section {
                        section_title: normalize_heading_text(text),
                        placeholder_id,
                        sub_sections: Vec::new(),
                    },
                    level,
                    buffer: String::new(),
                });
            }
            DocElement::Paragraph { text } => {
                if let Some(top) = stack.last_mut() {
                    if !top.buffer.is_empty() {
                        top.buffer.push('\n');
                    }
                    top.buffer.push_str(text);
                }
            }
            DocElement::Image { .. } => {}
        }
    }
    while let Some(frame) = stack.pop() {
        finish_frame(&mut stack, &mut roots, &mut content_sections, frame);
    }

    if roots.is_empty() && content_sections.is_empty() {
        let all_text = elements
            .iter()
            .filter_map(|e| match e {
                DocElement::Paragraph { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = all_text.trim().to_string();
        roots.push(Section {
            section_title: "Document Content".to_string(),
            placeholder_id: "placeholder_document_content".to_string(),
            sub_sections: Vec::new(),
        });
        content_sections.push(ContentSection {
            placeholder_id: "placeholder_document_content".to_string(),
            section_title: "Document Content".to_string(),
            word_count: word_count(&trimmed),
            sample_text: trimmed,
        });
    }

    (SectionHierarchy { sections: roots }, content_sections)
}

fn finish_frame(stack: &mut Vec<Frame>, roots: &mut Vec<Section>, content_sections: &mut Vec<ContentSection>, frame: Frame) {
    let sample_text = frame.buffer.trim().to_string();
    if !sample_text.is_empty() {
        content_sections.push(ContentSection {
            placeholder_id: frame.section.placeholder_id.clone(),
            section_title: frame.section.section_title.clone(),
            word_count: word_count(&sample_text),
            sample_text,
        });
    }
    if let Some(parent) = stack.last_mut() {
        parent.section.sub_sections.push(frame.section);
    } else {
        roots.push(frame.section);
    }
}

async fn extract_images(job_id: &str, elements: &[DocElement], store: &dyn DocumentStore) -> Result<Vec<LogoAsset>> {
    let mut assets = Vec::new();
    let mut n = 0usize;

    for element in elements {
        let DocElement::Image { src, width, height } = element else {
            continue;
        };
        let Some(bytes) = decode_data_uri(src) else {
            tracing::warn!(src = %truncate_for_log(src), "skipping non-data-URI Google Docs image");
            continue;
        };

        let key = crate::model::keys::image(job_id, &format!("google_{n}"), "png");
        store.upload(&key, bytes, "image/png").await?;

        assets.push(LogoAsset {
            asset_id: format!("google_{n}"),
            asset_type: AssetType::Image,
            bounding_box: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: width.unwrap_or(100.0),
                height: height.unwrap_or(100.0),
                page_number: 1,
            },
            secure_url: None,
            storage_key: Some(key),
        });
        n += 1;
    }

    Ok(assets)
}

fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
    let rest = src.strip_prefix("data:")?;
    let (_meta, payload) = rest.split_once(',')?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

fn truncate_for_log(s: &str) -> String {
    s.chars().take(60).collect()
}
