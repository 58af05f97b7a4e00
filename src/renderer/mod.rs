//! OOXML template renderer (C8, spec §4.8): turns a `TemplateJson`/
//! `ContextJson` pair into a valid `.docx` package, in either final-content
//! mode or placeholder-template mode, plus a substitution pass that fills
//! a placeholder package in a second phase.

pub mod body;
pub mod color;
pub mod placeholder;
pub mod styles;
pub mod units;

use std::collections::HashMap;
use std::io::{Cursor, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::model::{ContextJson, LayoutRules, Orientation, TemplateJson};
use crate::storage::DocumentStore;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("malformed OOXML package: {0}")]
    InvalidPackage(String),
    #[error("failed to assemble OOXML package: {0}")]
    Package(String),
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Render-time knobs (spec §4.8). Map keys are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub include_logos: bool,
    pub include_template_logos_from_storage: bool,
    pub emit_placeholder_for_missing_content: bool,
    pub content_overrides: HashMap<String, String>,
    pub logo_overrides: HashMap<String, Vec<u8>>,
}

struct MediaPart {
    rel_id: String,
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Detects a raster format by magic bytes, defaulting to PNG (spec §4.8
/// step 3).
fn detect_image_format(bytes: &[u8]) -> (&'static str, &'static str) {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        ("png", "image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        ("jpeg", "image/jpeg")
    } else if bytes.starts_with(&[0x47, 0x49, 0x46]) {
        ("gif", "image/gif")
    } else if bytes.starts_with(&[0x42, 0x4D]) {
        ("bmp", "image/bmp")
    } else {
        ("png", "image/png")
    }
}

fn case_insensitive_get<'a, V>(map: &'a HashMap<String, V>, key: &str) -> Option<&'a V> {
    let key = key.to_lowercase();
    map.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
}

async fn resolve_logo_bytes(
    asset_id: &str,
    storage_key: Option<&str>,
    options: &RenderOptions,
    store: Option<&dyn DocumentStore>,
) -> Option<Vec<u8>> {
    if let Some(bytes) = case_insensitive_get(&options.logo_overrides, asset_id) {
        return Some(bytes.clone());
    }
    if options.include_template_logos_from_storage {
        if let (Some(key), Some(store)) = (storage_key, store) {
            match store.download(key).await {
                Ok(bytes) => return Some(bytes),
                Err(e) => {
                    tracing::warn!(asset_id, error = %e, "failed to download logo asset for rendering");
                }
            }
        }
    }
    None
}

fn drawing_paragraph_xml(rel_id: &str, doc_pr_id: u32, asset_id: &str, width_px: f64, height_px: f64) -> String {
    let width_px = if width_px > 0.0 { width_px } else { 180.0 };
    let height_px = if height_px > 0.0 { height_px } else { 120.0 };
    let cx = units::px_to_emu(width_px);
    let cy = units::px_to_emu(height_px);

    format!(
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{doc_pr_id}" name="{asset_id}" title="{asset_id}"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{doc_pr_id}" name="{asset_id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel_id}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        ),
        cx = cx,
        cy = cy,
        doc_pr_id = doc_pr_id,
        asset_id = asset_id,
        rel_id = rel_id,
    )
}

fn section_properties_xml(layout: &LayoutRules) -> String {
    let width = units::mm_to_twips(layout.page_width_mm);
    let height = units::mm_to_twips(layout.page_height_mm);
    let top = units::mm_to_twips(layout.margins.top);
    let bottom = units::mm_to_twips(layout.margins.bottom);
    let left = units::mm_to_twips(layout.margins.left);
    let right = units::mm_to_twips(layout.margins.right);
    let orientation_attr = if layout.orientation == Orientation::Landscape {
        r#" w:orient="landscape""#
    } else {
        ""
    };
    let (width, height) = if layout.orientation == Orientation::Landscape {
        (height.max(width), width.min(height))
    } else {
        (width, height)
    };

    format!(
        r#"<w:sectPr><w:pgSz w:w="{width}" w:h="{height}"{orientation_attr}/><w:pgMar w:top="{top}" w:bottom="{bottom}" w:left="{left}" w:right="{right}"/></w:sectPr>"#
    )
}

async fn build_media_parts(
    template: &TemplateJson,
    options: &RenderOptions,
    store: Option<&dyn DocumentStore>,
) -> (Vec<MediaPart>, String) {
    if !options.include_logos {
        return (Vec::new(), String::new());
    }

    let mut sorted = template.logo_map.clone();
    sorted.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));

    let mut parts = Vec::new();
    let mut paragraphs = String::new();
    let mut next_rel_id = 1u32;

    for asset in &sorted {
        let Some(bytes) = resolve_logo_bytes(&asset.asset_id, asset.storage_key.as_deref(), options, store).await else {
            continue;
        };

        let (ext, content_type) = detect_image_format(&bytes);
        let rel_id = format!("rId{}", 100 + next_rel_id);
        let doc_pr_id = next_rel_id;
        let file_name = format!("word/media/image{next_rel_id}.{ext}");
        next_rel_id += 1;

        paragraphs.push_str(&drawing_paragraph_xml(
            &rel_id,
            doc_pr_id,
            &asset.asset_id,
            asset.bounding_box.width,
            asset.bounding_box.height,
        ));

        parts.push(MediaPart {
            rel_id,
            file_name,
            content_type: content_type.to_string(),
            bytes,
        });
    }

    (parts, paragraphs)
}

fn content_types_xml(media: &[MediaPart]) -> String {
    let mut extensions: Vec<&str> = media.iter().map(|m| m.file_name.rsplit('.').next().unwrap_or("png")).collect();
    extensions.sort_unstable();
    extensions.dedup();

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Text(BytesText::from_escaped(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        )))
        .unwrap();

    let mut types = BytesStart::new("Types");
    types.push_attribute(("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types"));
    writer.write_event(Event::Start(types)).unwrap();

    for (ext, mime) in [("rels", "application/vnd.openxmlformats-package.relationships+xml"), ("xml", "application/xml")] {
        let mut default = BytesStart::new("Default");
        default.push_attribute(("Extension", ext));
        default.push_attribute(("ContentType", mime));
        writer.write_event(Event::Empty(default)).unwrap();
    }
    for ext in &extensions {
        let mime = match *ext {
            "png" => "image/png",
            "jpeg" | "jpg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            _ => "application/octet-stream",
        };
        let mut default = BytesStart::new("Default");
        default.push_attribute(("Extension", *ext));
        default.push_attribute(("ContentType", mime));
        writer.write_event(Event::Empty(default)).unwrap();
    }

    for (part_name, content_type) in [
        ("/word/document.xml", "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"),
        ("/word/styles.xml", "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"),
    ] {
        let mut over_ride = BytesStart::new("Override");
        over_ride.push_attribute(("PartName", part_name));
        over_ride.push_attribute(("ContentType", content_type));
        writer.write_event(Event::Empty(over_ride)).unwrap();
    }

    writer.write_event(Event::End(BytesEnd::new("Types"))).unwrap();
    String::from_utf8(writer.into_inner().into_inner()).unwrap()
}

fn root_rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
}

fn document_rels_xml(media: &[MediaPart]) -> String {
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    );
    for part in media {
        let target = part.file_name.trim_start_matches("word/");
        rels.push_str(&format!(
            r#"<Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{target}"/>"#,
            part.rel_id
        ));
    }
    rels.push_str("</Relationships>");
    rels
}

fn document_xml(body_xml: &str, logo_xml: &str, section_properties: &str) -> String {
    let mut combined_body = format!("{logo_xml}{body_xml}");
    if !combined_body.contains("<w:p") {
        combined_body.push_str(r#"<w:p><w:r><w:t xml:space="preserve"> </w:t></w:r></w:p>"#);
    }
    combined_body.push_str(section_properties);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{combined_body}</w:body></w:document>"#
    )
}

fn write_zip_entry(writer: &mut ZipWriter<&mut Cursor<Vec<u8>>>, name: &str, bytes: &[u8]) -> Result<()> {
    writer
        .start_file(name, SimpleFileOptions::default())
        .map_err(|e| RenderError::Package(e.to_string()))?;
    writer
        .write_all(bytes)
        .map_err(|e| RenderError::Package(e.to_string()))?;
    Ok(())
}

/// Renders a final or placeholder OOXML package from a template/context
/// pair (spec §4.8 steps 1-7).
pub async fn render(
    template: &TemplateJson,
    context: Option<&ContextJson>,
    options: &RenderOptions,
    store: Option<&dyn DocumentStore>,
) -> Result<Vec<u8>> {
    let content_blocks = context.map(|c| c.content_blocks.as_slice()).unwrap_or(&[]);

    let mut body_writer = Writer::new(Cursor::new(Vec::new()));
    body::write_body(&mut body_writer, &template.section_hierarchy.sections, content_blocks, options);
    let body_xml = String::from_utf8(body_writer.into_inner().into_inner()).unwrap();

    let (media, logo_xml) = build_media_parts(template, options, store).await;
    let section_properties = section_properties_xml(&template.visual_theme.layout_rules);
    let document = document_xml(&body_xml, &logo_xml, &section_properties);
    let styles = styles::build_styles_xml(&template.visual_theme);
    let content_types = content_types_xml(&media);
    let document_rels = document_rels_xml(&media);

    let mut output = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut output);
        write_zip_entry(&mut writer, "[Content_Types].xml", content_types.as_bytes())?;
        write_zip_entry(&mut writer, "_rels/.rels", root_rels_xml().as_bytes())?;
        write_zip_entry(&mut writer, "word/document.xml", document.as_bytes())?;
        write_zip_entry(&mut writer, "word/styles.xml", styles.as_bytes())?;
        write_zip_entry(&mut writer, "word/_rels/document.xml.rels", document_rels.as_bytes())?;
        for part in &media {
            write_zip_entry(&mut writer, &part.file_name, &part.bytes)?;
        }
        writer.finish().map_err(|e| RenderError::Package(e.to_string()))?;
    }

    Ok(output.into_inner())
}

/// Renders the placeholder (fill-in-the-blanks) variant: every unresolved
/// section emits its `{{PlaceholderId}}` token regardless of content
/// blocks (spec §4.8 "template document emission").
pub async fn render_template(template: &TemplateJson, store: Option<&dyn DocumentStore>) -> Result<Vec<u8>> {
    let options = RenderOptions {
        include_logos: true,
        include_template_logos_from_storage: true,
        emit_placeholder_for_missing_content: true,
        content_overrides: HashMap::new(),
        logo_overrides: HashMap::new(),
    };
    render(template, None, &options, store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Section, SectionHierarchy, VisualTheme};

    fn sample_template() -> TemplateJson {
        TemplateJson {
            visual_theme: VisualTheme::default(),
            section_hierarchy: SectionHierarchy {
                sections: vec![Section {
                    section_title: "Summary".to_string(),
                    placeholder_id: "placeholder_summary".to_string(),
                    sub_sections: Vec::new(),
                }],
            },
            logo_map: Vec::new(),
        }
    }

    #[tokio::test]
    async fn render_without_content_emits_placeholder_template() {
        let template = sample_template();
        let bytes = render_template(&template, None).await.unwrap();
        assert!(!bytes.is_empty());

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut document = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut document, &mut xml).unwrap();
        assert!(xml.contains("{{placeholder_summary}}"));
        assert!(xml.contains("<w:sectPr>"));
    }

    #[tokio::test]
    async fn empty_section_hierarchy_still_produces_a_non_empty_body() {
        let template = TemplateJson {
            visual_theme: VisualTheme::default(),
            section_hierarchy: SectionHierarchy { sections: Vec::new() },
            logo_map: Vec::new(),
        };
        let options = RenderOptions::default();
        let bytes = render(&template, None, &options, None).await.unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut document = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut document, &mut xml).unwrap();
        assert!(xml.contains("<w:p>"));
        assert!(xml.trim_end().ends_with("</w:document>"));
    }
}
