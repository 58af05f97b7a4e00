//! Placeholder substitution pass (spec §4.8 "Placeholder substitution
//! pass"): fills a previously rendered placeholder document with final
//! content and swaps logo images in place, without re-deriving the rest
//! of the package.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use regex::Regex;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use super::{RenderError, RenderOptions, body};

fn paragraph_regex() -> Regex {
    Regex::new(r"(?s)<w:p\b.*?</w:p>").unwrap()
}

fn text_regex() -> Regex {
    Regex::new(r"(?s)<w:t[^>]*>(.*?)</w:t>").unwrap()
}

fn placeholder_token_regex() -> Regex {
    Regex::new(r"^\{\{(?P<id>[^}]+)\}\}$").unwrap()
}

fn docpr_regex() -> Regex {
    Regex::new(r"<wp:docPr\b[^>]*>").unwrap()
}

fn attr_regex(name: &str) -> Regex {
    Regex::new(&format!(r#"{name}="([^"]*)""#)).unwrap()
}

fn blip_embed_regex() -> Regex {
    Regex::new(r#"<a:blip[^>]*r:embed="([^"]+)""#).unwrap()
}

fn relationship_regex() -> Regex {
    Regex::new(r#"<Relationship[^>]*Id="([^"]+)"[^>]*Target="([^"]+)"[^>]*/?>"#).unwrap()
}

fn case_insensitive_get<'a, V>(map: &'a HashMap<String, V>, key: &str) -> Option<&'a V> {
    let key = key.to_lowercase();
    map.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
}

/// Concatenated visible text of a single `<w:p>...</w:p>` block.
fn paragraph_text(block: &str) -> String {
    text_regex().captures_iter(block).map(|c| c[1].to_string()).collect()
}

/// Renders replacement paragraphs for a resolved placeholder value, in the
/// same shape `body::write_body` would have produced for ordinary content.
fn render_override_paragraphs(text: &str) -> String {
    use quick_xml::Writer;
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    for line in text.split(['\n', '\r']).map(str::trim).filter(|l| !l.is_empty()) {
        let bulleted = line.starts_with('-') || line.starts_with('*') || line.starts_with('•');
        let rendered = if bulleted {
            format!("• {}", line.trim_start_matches(['-', '*', '•']).trim_start())
        } else {
            line.to_string()
        };
        body::write_plain_paragraph(&mut writer, &rendered);
    }
    String::from_utf8(writer.into_inner().into_inner()).unwrap()
}

fn rewrite_document_xml(document_xml: &str, options: &RenderOptions, rels: &HashMap<String, String>) -> (String, Vec<(String, Vec<u8>)>) {
    let mut output = String::with_capacity(document_xml.len());
    let mut cursor = 0;
    let mut media_overwrites = Vec::new();

    for m in paragraph_regex().find_iter(document_xml) {
        output.push_str(&document_xml[cursor..m.start()]);
        cursor = m.end();

        let block = m.as_str();
        let text = paragraph_text(block);
        let trimmed = text.trim();

        if let Some(captures) = placeholder_token_regex().captures(trimmed) {
            let id = &captures["id"];
            match case_insensitive_get(&options.content_overrides, id) {
                Some(value) => output.push_str(&render_override_paragraphs(value)),
                None => {}
            }
            continue;
        }

        for tag in docpr_regex().find_iter(block) {
            let tag = tag.as_str();
            let name = attr_regex("name").captures(tag).map(|c| c[1].to_string());
            let title = attr_regex("title").captures(tag).map(|c| c[1].to_string());
            let identifiers = [name, title].into_iter().flatten();

            for identifier in identifiers {
                if let Some(bytes) = case_insensitive_get(&options.logo_overrides, &identifier) {
                    if let Some(embed) = blip_embed_regex().captures(block) {
                        let rid = &embed[1];
                        if let Some(target) = rels.get(rid) {
                            let path = normalize_media_path(target);
                            media_overwrites.push((path, bytes.clone()));
                        }
                    }
                }
            }
        }

        output.push_str(block);
    }
    output.push_str(&document_xml[cursor..]);

    (output, media_overwrites)
}

fn normalize_media_path(target: &str) -> String {
    let trimmed = target.trim_start_matches("../");
    if trimmed.starts_with("word/") {
        trimmed.to_string()
    } else {
        format!("word/{trimmed}")
    }
}

fn parse_relationships(rels_xml: &str) -> HashMap<String, String> {
    relationship_regex()
        .captures_iter(rels_xml)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Applies `options.content_overrides`/`options.logo_overrides` to an
/// existing placeholder package, returning the rewritten OOXML bytes.
pub fn substitute(package: &[u8], options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    let mut archive = ZipArchive::new(Cursor::new(package))
        .map_err(|e| RenderError::InvalidPackage(e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| RenderError::InvalidPackage(e.to_string()))?;
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| RenderError::InvalidPackage(e.to_string()))?;
        entries.push((name, bytes));
    }

    let document_xml = entries
        .iter()
        .find(|(name, _)| name == "word/document.xml")
        .map(|(_, bytes)| String::from_utf8_lossy(bytes).to_string())
        .ok_or_else(|| RenderError::InvalidPackage("missing word/document.xml".to_string()))?;

    let rels = entries
        .iter()
        .find(|(name, _)| name == "word/_rels/document.xml.rels")
        .map(|(_, bytes)| parse_relationships(&String::from_utf8_lossy(bytes)))
        .unwrap_or_default();

    let (rewritten_document, media_overwrites) = rewrite_document_xml(&document_xml, options, &rels);

    for (name, bytes) in entries.iter_mut() {
        if *name == "word/document.xml" {
            *bytes = rewritten_document.clone().into_bytes();
            continue;
        }
        if let Some((_, replacement)) = media_overwrites.iter().find(|(path, _)| path == name) {
            *bytes = replacement.clone();
        }
    }

    let mut output = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut output);
        let options_zip = SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer
                .start_file(name, options_zip)
                .map_err(|e| RenderError::Package(e.to_string()))?;
            writer
                .write_all(&bytes)
                .map_err(|e| RenderError::Package(e.to_string()))?;
        }
        writer
            .finish()
            .map_err(|e| RenderError::Package(e.to_string()))?;
    }

    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_paragraph_is_detected() {
        let block = r#"<w:p><w:r><w:t xml:space="preserve">{{placeholder_intro}}</w:t></w:r></w:p>"#;
        let text = paragraph_text(block);
        assert!(placeholder_token_regex().is_match(text.trim()));
    }

    #[test]
    fn relationship_parsing_extracts_id_target_pairs() {
        let rels = r#"<?xml version="1.0"?><Relationships><Relationship Id="rId4" Type="..." Target="media/image1.png"/></Relationships>"#;
        let parsed = parse_relationships(rels);
        assert_eq!(parsed.get("rId4").unwrap(), "media/image1.png");
    }

    #[test]
    fn media_path_normalization_keeps_word_prefix() {
        assert_eq!(normalize_media_path("media/image1.png"), "word/media/image1.png");
        assert_eq!(normalize_media_path("../media/image1.png"), "word/media/image1.png");
    }
}
