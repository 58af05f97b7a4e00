//! Office Open XML structural extractor: theme extraction (§4.5.1), the
//! statistical heading detector (§4.5.2), and image extraction (§4.5.3).
//! No teacher analogue exists for this analyzer; the OOXML package
//! handling (`zip` + `quick-xml`) is grounded on
//! `examples/other_examples/manifests/BZM2000-ai-toolkit/Cargo.toml`.

use crate::model::{
    BoundingBox, ContentSection, FontDefinition, FontMap, FontWeight, LayoutRules, LogoAsset,
    AssetType, Margins, NamedColor, Orientation, Section, SectionHierarchy, TemplateJson,
    VisualTheme,
};
use crate::parsing::{DocumentHandler, ParseError, ParseInput, Result};
use crate::storage::DocumentStore;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::OnceLock;
use zip::ZipArchive;

pub struct DocxHandler;

#[async_trait]
impl DocumentHandler for DocxHandler {
    async fn parse(
        &self,
        job_id: &str,
        input: ParseInput,
        store: &dyn DocumentStore,
    ) -> Result<crate::model::ParseResult> {
        let bytes = match input {
            ParseInput::Bytes(b) => b,
            ParseInput::Url(_) => {
                return Err(ParseError::MalformedDocument(
                    "docx handler requires bytes, not a URL".to_string(),
                ))
            }
        };

        let package = DocxPackage::open(&bytes)?;
        let style_themes = package.style_themes();
        let visual_theme = build_visual_theme(&package, &style_themes)?;
        let paragraphs = package.extract_paragraphs(&style_themes)?;
        let levels = detect_headings(&paragraphs);
        let (section_hierarchy, content_sections) = build_tree(&paragraphs, &levels);
        let logo_map = extract_images(job_id, &package, store).await?;

        Ok(crate::model::ParseResult {
            template_json: TemplateJson {
                visual_theme,
                section_hierarchy,
                logo_map,
            },
            content_sections,
        })
    }
}

// ---------------------------------------------------------------------
// Package loading
// ---------------------------------------------------------------------

struct DocxPackage {
    document_xml: String,
    styles_xml: String,
    rels: HashMap<String, String>,
    media: HashMap<String, Vec<u8>>,
}

impl DocxPackage {
    fn open(bytes: &[u8]) -> Result<Self> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut zip = ZipArchive::new(cursor)
            .map_err(|e| ParseError::MalformedDocument(format!("invalid OOXML package: {e}")))?;

        let document_xml = read_entry(&mut zip, "word/document.xml")?;
        let styles_xml = read_entry(&mut zip, "word/styles.xml").unwrap_or_default();
        let rels_xml = read_entry(&mut zip, "word/_rels/document.xml.rels").unwrap_or_default();
        let rels = parse_relationships(&rels_xml);

        let mut media = HashMap::new();
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| ParseError::MalformedDocument(e.to_string()))?;
            let name = file.name().to_string();
            if let Some(rel_name) = name.strip_prefix("word/media/") {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)
                    .map_err(|e| ParseError::MalformedDocument(e.to_string()))?;
                media.insert(rel_name.to_string(), buf);
            }
        }

        Ok(Self {
            document_xml,
            styles_xml,
            rels,
            media,
        })
    }

    /// `StyleId -> (is_heading_style, style_level, font)` derived from
    /// `word/styles.xml`, used both for theme extraction and per-paragraph
    /// feature lookup.
    fn style_themes(&self) -> HashMap<String, StyleTheme> {
        parse_styles(&self.styles_xml)
    }

    fn extract_paragraphs(&self, styles: &HashMap<String, StyleTheme>) -> Result<Vec<ParagraphFeatures>> {
        parse_paragraphs(&self.document_xml, styles)
    }
}

fn read_entry(zip: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Result<String> {
    let mut file = zip
        .by_name(name)
        .map_err(|_| ParseError::MalformedDocument(format!("missing package part: {name}")))?;
    let mut out = String::new();
    file.read_to_string(&mut out)
        .map_err(|e| ParseError::MalformedDocument(e.to_string()))?;
    Ok(out)
}

fn parse_relationships(xml: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if xml.is_empty() {
        return map;
    }
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = attr.unescape_value().ok().map(|v| v.to_string()),
                        b"Target" => target = attr.unescape_value().ok().map(|v| v.to_string()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    map.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    map
}

// ---------------------------------------------------------------------
// Theme extraction (spec §4.5.1)
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StyleTheme {
    name: String,
    is_heading_style: bool,
    style_level: Option<u8>,
    font: FontDefinition,
}

fn parse_styles(xml: &str) -> HashMap<String, StyleTheme> {
    let mut styles = HashMap::new();
    if xml.is_empty() {
        return styles;
    }
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut current_style_id: Option<String> = None;
    let mut current_name: Option<String> = None;
    let mut family = None;
    let mut size_pt = None;
    let mut bold = false;
    let mut color = None;
    let mut in_style = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:style" => {
                in_style = true;
                current_style_id = attr_value(&e, b"w:styleId");
                current_name = None;
                family = None;
                size_pt = None;
                bold = false;
                color = None;
            }
            Ok(Event::Empty(e)) if in_style && e.name().as_ref() == b"w:name" => {
                current_name = attr_value(&e, b"w:val");
            }
            Ok(Event::Empty(e)) if in_style && e.name().as_ref() == b"w:b" => {
                bold = attr_value(&e, b"w:val").map(|v| v != "0" && v != "false").unwrap_or(true);
            }
            Ok(Event::Empty(e)) if in_style && e.name().as_ref() == b"w:sz" => {
                if let Some(v) = attr_value(&e, b"w:val") {
                    size_pt = v.parse::<f64>().ok().map(|half| half / 2.0);
                }
            }
            Ok(Event::Empty(e)) if in_style && e.name().as_ref() == b"w:color" => {
                color = attr_value(&e, b"w:val");
            }
            Ok(Event::Empty(e)) if in_style && e.name().as_ref() == b"w:rFonts" => {
                family = attr_value(&e, b"w:ascii");
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => {
                if let Some(style_id) = current_style_id.take() {
                    let is_heading_style = style_id.to_lowercase().starts_with("heading")
                        || style_id.to_lowercase().starts_with("title");
                    let style_level = heading_style_level(&style_id);
                    let font = FontDefinition {
                        family: family.clone().unwrap_or_else(|| "Calibri".to_string()),
                        size_pt: size_pt.unwrap_or(11.0),
                        weight: if bold { FontWeight::Bold } else { FontWeight::Normal },
                        color: normalize_doc_color(color.as_deref()),
                    };
                    let name = current_name.clone().unwrap_or_else(|| style_id.clone());
                    styles.insert(
                        style_id,
                        StyleTheme {
                            name,
                            is_heading_style,
                            style_level,
                            font,
                        },
                    );
                }
                in_style = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    styles
}

fn heading_style_level(style_id: &str) -> Option<u8> {
    let lower = style_id.to_lowercase();
    if lower == "title" {
        return Some(1);
    }
    if lower.starts_with("heading") {
        let digits: String = lower.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
        let digits: String = digits.chars().rev().collect();
        if let Ok(level) = digits.parse::<u8>() {
            return Some(level.clamp(1, 6));
        }
    }
    None
}

fn normalize_doc_color(raw: Option<&str>) -> String {
    match raw {
        None => "000000".to_string(),
        Some(v) if v.eq_ignore_ascii_case("auto") => "000000".to_string(),
        Some(v) => v.to_uppercase(),
    }
}

fn attr_value(e: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_string())
}

fn build_visual_theme(package: &DocxPackage, styles: &HashMap<String, StyleTheme>) -> Result<VisualTheme> {
    let mut font_map = FontMap::new();
    let mut seen_colors: Vec<String> = Vec::new();
    for theme in styles.values() {
        font_map.insert(theme.name.clone(), theme.font.clone());
        if theme.font.color != "000000" && !seen_colors.contains(&theme.font.color) {
            seen_colors.push(theme.font.color.clone());
        }
    }
    let labels = ["primary", "secondary", "accent"];
    let color_palette = seen_colors
        .into_iter()
        .take(3)
        .zip(labels)
        .map(|(hex, label)| NamedColor {
            name: label.to_string(),
            hex_code: hex,
        })
        .collect();

    let layout_rules = parse_layout_rules(&package.document_xml);

    Ok(VisualTheme {
        color_palette,
        font_map,
        layout_rules,
    })
}

const TWIPS_TO_MM: f64 = 0.01764;

fn parse_layout_rules(document_xml: &str) -> LayoutRules {
    let mut reader = Reader::from_str(document_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_sect_pr = false;
    let mut found = LayoutRules::default();
    let mut width_twips = None;
    let mut height_twips = None;
    let mut orientation = Orientation::Portrait;
    let mut margins = found.margins.clone();
    let mut done = false;

    loop {
        if done {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:sectPr" => {
                in_sect_pr = true;
            }
            Ok(Event::Empty(e)) if in_sect_pr && e.name().as_ref() == b"w:pgSz" => {
                width_twips = attr_value(&e, b"w:w").and_then(|v| v.parse::<f64>().ok());
                height_twips = attr_value(&e, b"w:h").and_then(|v| v.parse::<f64>().ok());
                if attr_value(&e, b"w:orient").as_deref() == Some("landscape") {
                    orientation = Orientation::Landscape;
                }
            }
            Ok(Event::Empty(e)) if in_sect_pr && e.name().as_ref() == b"w:pgMar" => {
                if let Some(v) = attr_value(&e, b"w:top").and_then(|v| v.parse::<f64>().ok()) {
                    margins.top = v * TWIPS_TO_MM;
                }
                if let Some(v) = attr_value(&e, b"w:bottom").and_then(|v| v.parse::<f64>().ok()) {
                    margins.bottom = v * TWIPS_TO_MM;
                }
                if let Some(v) = attr_value(&e, b"w:left").and_then(|v| v.parse::<f64>().ok()) {
                    margins.left = v * TWIPS_TO_MM;
                }
                if let Some(v) = attr_value(&e, b"w:right").and_then(|v| v.parse::<f64>().ok()) {
                    margins.right = v * TWIPS_TO_MM;
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:sectPr" => {
                done = true;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if let (Some(w), Some(h)) = (width_twips, height_twips) {
        found.page_width_mm = w * TWIPS_TO_MM;
        found.page_height_mm = h * TWIPS_TO_MM;
    }
    found.orientation = orientation;
    found.margins = margins;
    found
}

// ---------------------------------------------------------------------
// Pass 1 — feature vector per paragraph (spec §4.5.2)
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ParagraphFeatures {
    pub text: String,
    pub word_count: usize,
    pub ends_with_colon: bool,
    pub is_numbered: bool,
    pub is_bulleted: bool,
    pub uppercase_ratio: f64,
    pub style_id: Option<String>,
    pub is_heading_style: bool,
    pub style_level: Option<u8>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font_size_pt: f64,
    pub font_family: String,
    pub color: String,
    pub left_indent_twips: i64,
    pub space_before: i64,
    pub space_after: i64,
    pub document_index: usize,
}

fn parse_paragraphs(document_xml: &str, styles: &HashMap<String, StyleTheme>) -> Result<Vec<ParagraphFeatures>> {
    let mut reader = Reader::from_str(document_xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut document_index = 0usize;

    let mut in_paragraph = false;
    let mut text = String::new();
    let mut style_id: Option<String> = None;
    let mut left_indent_twips = 0i64;
    let mut space_before = 0i64;
    let mut space_after = 0i64;

    let mut in_run_props = false;
    let mut run_bold = false;
    let mut run_italic = false;
    let mut run_underline = false;
    let mut run_size_pt: Option<f64> = None;
    let mut run_color: Option<String> = None;
    let mut run_family: Option<String> = None;
    let mut first_run_captured = false;
    let mut p_bold = false;
    let mut p_italic = false;
    let mut p_underline = false;
    let mut p_size_pt: Option<f64> = None;
    let mut p_color: Option<String> = None;
    let mut p_family: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:p" => {
                in_paragraph = true;
                text.clear();
                style_id = None;
                left_indent_twips = 0;
                space_before = 0;
                space_after = 0;
                first_run_captured = false;
                p_bold = false;
                p_italic = false;
                p_underline = false;
                p_size_pt = None;
                p_color = None;
                p_family = None;
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if in_paragraph && e.name().as_ref() == b"w:pStyle" => {
                style_id = attr_value(&e, b"w:val");
            }
            Ok(Event::Empty(e)) if in_paragraph && e.name().as_ref() == b"w:ind" => {
                if let Some(v) = attr_value(&e, b"w:left").or_else(|| attr_value(&e, b"w:start")) {
                    left_indent_twips = v.parse::<i64>().unwrap_or(0);
                }
            }
            Ok(Event::Empty(e)) if in_paragraph && e.name().as_ref() == b"w:spacing" => {
                if let Some(v) = attr_value(&e, b"w:before") {
                    space_before = v.parse::<i64>().unwrap_or(0);
                }
                if let Some(v) = attr_value(&e, b"w:after") {
                    space_after = v.parse::<i64>().unwrap_or(0);
                }
            }
            Ok(Event::Start(e)) if in_paragraph && e.name().as_ref() == b"w:rPr" => {
                in_run_props = true;
                run_bold = false;
                run_italic = false;
                run_underline = false;
                run_size_pt = None;
                run_color = None;
                run_family = None;
            }
            Ok(Event::Empty(e)) if in_run_props && e.name().as_ref() == b"w:b" => {
                run_bold = attr_value(&e, b"w:val").map(|v| v != "0" && v != "false").unwrap_or(true);
            }
            Ok(Event::Empty(e)) if in_run_props && e.name().as_ref() == b"w:i" => {
                run_italic = attr_value(&e, b"w:val").map(|v| v != "0" && v != "false").unwrap_or(true);
            }
            Ok(Event::Empty(e)) if in_run_props && e.name().as_ref() == b"w:u" => {
                run_underline = attr_value(&e, b"w:val").map(|v| v != "none").unwrap_or(true);
            }
            Ok(Event::Empty(e)) if in_run_props && e.name().as_ref() == b"w:sz" => {
                run_size_pt = attr_value(&e, b"w:val").and_then(|v| v.parse::<f64>().ok()).map(|h| h / 2.0);
            }
            Ok(Event::Empty(e)) if in_run_props && e.name().as_ref() == b"w:color" => {
                run_color = attr_value(&e, b"w:val");
            }
            Ok(Event::Empty(e)) if in_run_props && e.name().as_ref() == b"w:rFonts" => {
                run_family = attr_value(&e, b"w:ascii");
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:rPr" => {
                in_run_props = false;
                if !first_run_captured {
                    p_bold = run_bold;
                    p_italic = run_italic;
                    p_underline = run_underline;
                    p_size_pt = run_size_pt;
                    p_color = run_color.clone();
                    p_family = run_family.clone();
                }
            }
            Ok(Event::Empty(e)) if in_paragraph && e.name().as_ref() == b"w:tab" => {
                text.push('\t');
            }
            Ok(Event::Empty(e)) if in_paragraph && e.name().as_ref() == b"w:br" => {
                text.push('\n');
            }
            Ok(Event::Text(e)) if in_paragraph => {
                if let Ok(unescaped) = e.unescape() {
                    if !first_run_captured && !unescaped.trim().is_empty() {
                        first_run_captured = true;
                    }
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => {
                in_paragraph = false;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    let style_theme = style_id.as_ref().and_then(|id| styles.get(id));
                    let is_heading_style = style_theme.map(|s| s.is_heading_style).unwrap_or(false);
                    let style_level = style_theme.and_then(|s| s.style_level);
                    let font_size_pt = p_size_pt
                        .or_else(|| style_theme.map(|s| s.font.size_pt))
                        .unwrap_or(11.0);
                    let font_family = p_family
                        .clone()
                        .or_else(|| style_theme.map(|s| s.font.family.clone()))
                        .unwrap_or_else(|| "Calibri".to_string());
                    let color = p_color
                        .clone()
                        .map(|c| normalize_doc_color(Some(&c)))
                        .or_else(|| style_theme.map(|s| s.font.color.clone()))
                        .unwrap_or_else(|| "000000".to_string());
                    let bold = p_bold || style_theme.map(|s| s.font.weight == FontWeight::Bold).unwrap_or(false);

                    paragraphs.push(ParagraphFeatures {
                        word_count: word_count(trimmed),
                        ends_with_colon: trimmed.ends_with(':'),
                        is_numbered: is_numbered(trimmed),
                        is_bulleted: is_bulleted(trimmed),
                        uppercase_ratio: uppercase_ratio(trimmed),
                        style_id: style_id.clone(),
                        is_heading_style,
                        style_level,
                        bold,
                        italic: p_italic,
                        underline: p_underline,
                        font_size_pt,
                        font_family,
                        color,
                        left_indent_twips,
                        space_before,
                        space_after,
                        document_index,
                        text: trimmed.to_string(),
                    });
                    document_index += 1;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::MalformedDocument(format!("xml error: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

fn word_count(text: &str) -> usize {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = WORD_RE.get_or_init(|| Regex::new(r"\b\w+\b").unwrap());
    re.find_iter(text).count()
}

fn is_numbered(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d+(\.\d+)*|[A-Z]\)|[IVXLC]+\.)\s+").unwrap());
    re.is_match(text.trim_start())
}

fn is_bulleted(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(-|\*|•)\s+\S+").unwrap());
    re.is_match(text.trim_start())
}

fn uppercase_ratio(text: &str) -> f64 {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return 0.0;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters.len() as f64
}

// ---------------------------------------------------------------------
// Pass 2 — scoring (spec §4.5.2)
// ---------------------------------------------------------------------

/// Mode font size among non-bold/non-styled paragraphs, used as the body
/// baseline for the relative-size signal below. The mean would be pulled
/// up by headings still sitting in that same pool; mode isn't, since body
/// text repeats far more than any one heading size. Ties go to the
/// smallest size.
fn typical_body_font_size(paragraphs: &[ParagraphFeatures]) -> f64 {
    let mut sizes: Vec<f64> = paragraphs
        .iter()
        .filter(|p| !p.is_heading_style && !p.bold)
        .map(|p| p.font_size_pt)
        .collect();
    if sizes.is_empty() {
        return 11.0;
    }
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best_size = sizes[0];
    let mut best_count = 0usize;
    let mut i = 0;
    while i < sizes.len() {
        let mut j = i;
        while j < sizes.len() && (sizes[j] - sizes[i]).abs() < 0.01 {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best_size = sizes[i];
        }
        i = j;
    }
    best_size
}

fn heading_score(p: &ParagraphFeatures, body_font_size: f64) -> f64 {
    let mut score = 0.0;
    if p.is_heading_style {
        score += 0.40;
    }
    if p.font_size_pt > body_font_size * 1.1 {
        score += 0.30;
    } else if p.font_size_pt < body_font_size * 0.9 {
        score -= 0.20;
    }
    if p.bold {
        score += 0.15;
    }
    if p.word_count > 0 && p.word_count <= 15 {
        score += 0.10;
    } else if p.word_count > 30 {
        score -= 0.20;
    }
    if p.ends_with_colon {
        score += 0.10;
    }
    if p.is_numbered {
        score += 0.10;
    }
    if p.uppercase_ratio > 0.6 && p.word_count <= 10 {
        score += 0.10;
    }
    if p.is_bulleted {
        score -= 0.30;
    }
    let sentence_punct = p.text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    if sentence_punct >= 2 {
        score -= 0.20;
    }
    score.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------
// Pass 3 — level assignment / clustering (spec §4.5.2)
// ---------------------------------------------------------------------

fn detect_headings(paragraphs: &[ParagraphFeatures]) -> Vec<Option<u8>> {
    let avg_font = typical_body_font_size(paragraphs);

    let candidates: Vec<usize> = paragraphs
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let score = heading_score(p, avg_font);
            let threshold = if p.is_heading_style { 0.30 } else { 0.40 };
            score >= threshold
        })
        .map(|(i, _)| i)
        .collect();

    if candidates.is_empty() {
        return vec![None; paragraphs.len()];
    }

    let mut levels: Vec<Option<u8>> = vec![None; paragraphs.len()];

    let (styled, unstyled): (Vec<usize>, Vec<usize>) =
        candidates.iter().partition(|&&i| paragraphs[i].style_level.is_some());

    for &i in &styled {
        levels[i] = paragraphs[i].style_level;
    }

    let mut sorted = unstyled.clone();
    sorted.sort_by(|&a, &b| {
        let pa = &paragraphs[a];
        let pb = &paragraphs[b];
        pb.font_size_pt
            .partial_cmp(&pa.font_size_pt)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then((pb.bold as i32).cmp(&(pa.bold as i32)))
            .then(pb.left_indent_twips.cmp(&pa.left_indent_twips))
    });

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for &i in &sorted {
        let p = &paragraphs[i];
        let start_new = match groups.last() {
            None => true,
            Some(group) if groups.len() >= 6 => {
                let _ = group;
                false
            }
            Some(group) => {
                let head = &paragraphs[group[0]];
                (head.font_size_pt - p.font_size_pt).abs() >= 0.3 * avg_font
                    || head.bold != p.bold
                    || (head.left_indent_twips - p.left_indent_twips).abs() >= 100
            }
        };
        if start_new {
            groups.push(vec![i]);
        } else {
            groups.last_mut().unwrap().push(i);
        }
    }

    let mut group_of: HashMap<usize, usize> = HashMap::new();
    for (gi, group) in groups.iter().enumerate() {
        for &i in group {
            group_of.insert(i, gi);
        }
    }

    let mut doc_order_unstyled = unstyled.clone();
    doc_order_unstyled.sort();
    let mut stack: Vec<u8> = Vec::new();
    for &i in &doc_order_unstyled {
        let gi = group_of[&i];
        let base_level = ((gi + 1).min(6)) as u8;
        while let Some(&top) = stack.last() {
            if top >= base_level {
                stack.pop();
            } else {
                break;
            }
        }
        let stack_top = stack.last().copied().unwrap_or(0);
        let level = base_level.min(stack_top + 1).clamp(1, 6);
        levels[i] = Some(level);
        stack.push(level);
    }

    // Recurring-pattern adjustment: groups with >= 2 members take the
    // modal level already assigned within the group.
    for group in &groups {
        if group.len() >= 2 {
            let mut counts: HashMap<u8, usize> = HashMap::new();
            for &i in group {
                if let Some(l) = levels[i] {
                    *counts.entry(l).or_insert(0) += 1;
                }
            }
            if let Some((&modal, _)) = counts.iter().max_by_key(|(_, &c)| c) {
                for &i in group {
                    levels[i] = Some(modal);
                }
            }
        }
    }

    // Document-order no-level-jump clamp, across every candidate
    // (styled and unstyled alike).
    let mut ordered_candidates = candidates.clone();
    ordered_candidates.sort();
    for pos in 1..ordered_candidates.len() {
        let i = ordered_candidates[pos];
        let prev_i = ordered_candidates[pos - 1];
        let prev_level = levels[prev_i].unwrap_or(1);
        if let Some(level) = levels[i] {
            if level > prev_level + 1 {
                levels[i] = Some(prev_level + 1);
            }
        }
    }

    // Demote-by-one when level equals the previous candidate's and the
    // next candidate's font/indent signals a deeper nesting.
    for pos in 1..ordered_candidates.len() {
        let i = ordered_candidates[pos];
        let prev_i = ordered_candidates[pos - 1];
        if levels[i] == levels[prev_i] {
            if let Some(&next_i) = ordered_candidates.get(pos + 1) {
                let cur_font = paragraphs[i].font_size_pt;
                let next_font = paragraphs[next_i].font_size_pt;
                let cur_indent = paragraphs[i].left_indent_twips;
                let next_indent = paragraphs[next_i].left_indent_twips;
                if (cur_font - next_font) >= 1.0 || (next_indent - cur_indent) >= 100 {
                    if let Some(l) = levels[i] {
                        levels[i] = Some((l + 1).clamp(1, 6));
                    }
                }
            }
        }
    }

    levels
}

// ---------------------------------------------------------------------
// Pass 4 — tree build (spec §4.5.2)
// ---------------------------------------------------------------------

struct Frame {
    section: Section,
    level: u8,
    buffer: String,
}

fn normalize_heading_text(text: &str) -> String {
    text.trim()
        .trim_end_matches([':', '-', '–'])
        .trim()
        .to_string()
}

fn build_tree(paragraphs: &[ParagraphFeatures], levels: &[Option<u8>]) -> (SectionHierarchy, Vec<ContentSection>) {
    let mut stack: Vec<Frame> = Vec::new();
    let mut roots: Vec<Section> = Vec::new();
    let mut content_sections: Vec<ContentSection> = Vec::new();
    let mut counter = 0usize;

    for (i, p) in paragraphs.iter().enumerate() {
        if let Some(level) = levels[i] {
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
                    section_title: normalize_heading_text(&p.text),
                    placeholder_id,
                    sub_sections: Vec::new(),
                },
                level,
                buffer: String::new(),
            });
        } else if let Some(top) = stack.last_mut() {
            if !top.buffer.is_empty() {
                top.buffer.push('\n');
            }
            top.buffer.push_str(&p.text);
        }
    }
    while let Some(frame) = stack.pop() {
        finish_frame(&mut stack, &mut roots, &mut content_sections, frame);
    }

    if roots.is_empty() && content_sections.is_empty() {
        let all_text = paragraphs
            .iter()
            .map(|p| p.text.as_str())
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

// ---------------------------------------------------------------------
// Image extraction (spec §4.5.3)
// ---------------------------------------------------------------------

const EMU_PER_PX: f64 = 9525.0;

async fn extract_images(job_id: &str, package: &DocxPackage, store: &dyn DocumentStore) -> Result<Vec<LogoAsset>> {
    let extents = parse_inline_extents(&package.document_xml, &package.rels);
    let mut assets = Vec::new();
    let mut n = 0usize;

    // Iterate media parts in a stable order (by relationship target name)
    // so repeated parses of the same package are deterministic.
    let mut media_names: Vec<&String> = package.media.keys().collect();
    media_names.sort();

    for media_name in media_names {
        let bytes = package.media.get(media_name).unwrap();
        let ext = media_name.rsplit('.').next().unwrap_or("png").to_lowercase();
        let asset_id = format!("asset_{job_id}_{n}");
        n += 1;
        let key = crate::model::keys::image(job_id, &asset_id, &ext);
        let content_type = content_type_for_extension(&ext);
        store.upload(&key, bytes.clone(), content_type).await?;

        let bounding_box = extents
            .get(&format!("media/{media_name}"))
            .cloned()
            .unwrap_or(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 100.0,
                page_number: 1,
            });

        assets.push(LogoAsset {
            asset_id,
            asset_type: AssetType::Image,
            bounding_box,
            secure_url: None,
            storage_key: Some(key),
        });
    }

    Ok(assets)
}

fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Walks `document.xml` for `wp:extent`/`a:blip` pairs inside each
/// drawing, resolving the relationship id to its target media part.
fn parse_inline_extents(document_xml: &str, rels: &HashMap<String, String>) -> HashMap<String, BoundingBox> {
    let mut reader = Reader::from_str(document_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = HashMap::new();

    let mut current_extent: Option<(f64, f64)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"wp:extent" => {
                let cx = attr_value(&e, b"cx").and_then(|v| v.parse::<f64>().ok());
                let cy = attr_value(&e, b"cy").and_then(|v| v.parse::<f64>().ok());
                if let (Some(cx), Some(cy)) = (cx, cy) {
                    // cx/cy are EMU; px = EMU / 9525 (spec §4.5.3).
                    current_extent = Some((cx / EMU_PER_PX, cy / EMU_PER_PX));
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"a:blip" => {
                if let Some(embed) = attr_value(&e, b"r:embed") {
                    if let (Some((w, h)), Some(target)) = (current_extent, rels.get(&embed)) {
                        out.insert(
                            target.clone(),
                            BoundingBox {
                                x: 0.0,
                                y: 0.0,
                                width: w,
                                height: h,
                                page_number: 1,
                            },
                        );
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(
        text: &str,
        font_size_pt: f64,
        bold: bool,
        style_level: Option<u8>,
        is_heading_style: bool,
    ) -> ParagraphFeatures {
        ParagraphFeatures {
            word_count: word_count(text),
            ends_with_colon: text.ends_with(':'),
            is_numbered: is_numbered(text),
            is_bulleted: is_bulleted(text),
            uppercase_ratio: uppercase_ratio(text),
            style_id: None,
            is_heading_style,
            style_level,
            bold,
            italic: false,
            underline: false,
            font_size_pt,
            font_family: "Calibri".to_string(),
            color: "000000".to_string(),
            left_indent_twips: 0,
            space_before: 0,
            space_after: 0,
            document_index: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn relative_font_size_run_yields_two_heading_levels_and_a_body_paragraph() {
        let paragraphs = vec![
            para("Executive Summary", 18.0, false, None, false),
            para("Background", 14.0, false, None, false),
            para(
                "This is a plain body paragraph that should never be classified as a heading at all.",
                11.0,
                false,
                None,
                false,
            ),
        ];
        let levels = detect_headings(&paragraphs);
        assert_eq!(levels[0], Some(1));
        assert_eq!(levels[1], Some(2));
        assert_eq!(levels[2], None);
    }

    #[test]
    fn heading_3_style_always_gets_level_3() {
        let mut p = para("just a short label", 11.0, false, Some(3), true);
        p.is_heading_style = true;
        let levels = detect_headings(&[p]);
        assert_eq!(levels[0], Some(3));
    }

    #[test]
    fn bulleted_paragraphs_are_never_headings() {
        let p = para("- a short bold bullet", 18.0, true, None, false);
        assert!(p.is_bulleted);
        let levels = detect_headings(&[p]);
        assert_eq!(levels[0], None);
    }

    #[test]
    fn degenerate_document_synthesizes_a_single_section() {
        let paragraphs = vec![para("Just some plain text with no headings at all in it.", 11.0, false, None, false)];
        let levels = detect_headings(&paragraphs);
        assert!(levels.iter().all(|l| l.is_none()));
        let (hierarchy, content) = build_tree(&paragraphs, &levels);
        assert_eq!(hierarchy.sections.len(), 1);
        assert_eq!(hierarchy.sections[0].placeholder_id, "placeholder_document_content");
        assert_eq!(content.len(), 1);
    }

    #[test]
    fn tree_build_nests_subsections_under_their_parent() {
        let paragraphs = vec![
            para("Section One", 18.0, true, Some(1), true),
            para("Intro text for section one.", 11.0, false, None, false),
            para("Subsection A", 14.0, true, Some(2), true),
            para("Body text under the subsection.", 11.0, false, None, false),
        ];
        let levels: Vec<Option<u8>> = paragraphs.iter().map(|p| p.style_level).collect();
        let (hierarchy, content) = build_tree(&paragraphs, &levels);
        assert_eq!(hierarchy.sections.len(), 1);
        assert_eq!(hierarchy.sections[0].sub_sections.len(), 1);
        assert_eq!(content.len(), 2);
    }

    #[test]
    fn color_from_styles_normalizes_auto_to_black() {
        assert_eq!(normalize_doc_color(Some("auto")), "000000");
        assert_eq!(normalize_doc_color(Some("1a2b3c")), "1A2B3C");
        assert_eq!(normalize_doc_color(None), "000000");
    }
}
