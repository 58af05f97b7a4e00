//! Body emission (spec §4.8 step 4): a depth-first walk of the section
//! tree, resolving each placeholder's content against overrides and the
//! extracted content blocks, with bullet-line and missing-content handling.

use crate::model::{ContentBlock, Section};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::io::Cursor;

use super::RenderOptions;

const MAX_HEADING_LEVEL: u8 = 6;

/// Strips control characters other than TAB/LF/CR (spec §4.8 step 6).
pub fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn case_insensitive_lookup<'a, V>(map: &'a HashMap<String, V>, key: &str) -> Option<&'a V> {
    let key = key.to_lowercase();
    map.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
}

fn find_content_block<'a>(blocks: &'a [ContentBlock], placeholder_id: &str) -> Option<&'a ContentBlock> {
    let key = placeholder_id.to_lowercase();
    blocks.iter().find(|b| b.placeholder_id.to_lowercase() == key)
}

fn write_run(writer: &mut Writer<Cursor<Vec<u8>>>, text: &str, italic: bool) {
    writer.write_event(Event::Start(BytesStart::new("w:r"))).unwrap();
    if italic {
        writer.write_event(Event::Start(BytesStart::new("w:rPr"))).unwrap();
        writer.write_event(Event::Empty(BytesStart::new("w:i"))).unwrap();
        writer.write_event(Event::End(BytesEnd::new("w:rPr"))).unwrap();
    }
    let mut text_el = BytesStart::new("w:t");
    text_el.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(text_el)).unwrap();
    writer
        .write_event(Event::Text(BytesText::new(&sanitize_text(text))))
        .unwrap();
    writer.write_event(Event::End(BytesEnd::new("w:t"))).unwrap();
    writer.write_event(Event::End(BytesEnd::new("w:r"))).unwrap();
}

fn write_paragraph(writer: &mut Writer<Cursor<Vec<u8>>>, style_id: Option<&str>, text: &str, italic: bool) {
    writer.write_event(Event::Start(BytesStart::new("w:p"))).unwrap();
    if let Some(style_id) = style_id {
        writer.write_event(Event::Start(BytesStart::new("w:pPr"))).unwrap();
        let mut p_style = BytesStart::new("w:pStyle");
        p_style.push_attribute(("w:val", style_id));
        writer.write_event(Event::Empty(p_style)).unwrap();
        writer.write_event(Event::End(BytesEnd::new("w:pPr"))).unwrap();
    }
    write_run(writer, text, italic);
    writer.write_event(Event::End(BytesEnd::new("w:p"))).unwrap();
}

/// Writes a single `Normal`-styled paragraph; exposed for the placeholder
/// substitution pass, which rebuilds replacement paragraphs outside the
/// section walk.
pub fn write_plain_paragraph(writer: &mut Writer<Cursor<Vec<u8>>>, text: &str) {
    write_paragraph(writer, Some("Normal"), text, false);
}

fn write_content_lines(writer: &mut Writer<Cursor<Vec<u8>>>, raw_text: &str) {
    for line in raw_text.split(['\n', '\r']).map(str::trim).filter(|l| !l.is_empty()) {
        let bulleted = line.starts_with('-') || line.starts_with('*') || line.starts_with('•');
        let rendered = if bulleted {
            format!("• {}", line.trim_start_matches(['-', '*', '•']).trim_start())
        } else {
            line.to_string()
        };
        write_paragraph(writer, Some("Normal"), &rendered, false);
    }
}

fn write_section(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    section: &Section,
    level: u8,
    content_blocks: &[ContentBlock],
    options: &RenderOptions,
) {
    write_paragraph(
        writer,
        Some(&format!("Heading{level}")),
        &section.section_title,
        false,
    );

    let resolved = case_insensitive_lookup(&options.content_overrides, &section.placeholder_id)
        .map(String::as_str)
        .or_else(|| find_content_block(content_blocks, &section.placeholder_id).map(|b| b.section_sample_text.as_str()));

    match resolved {
        Some(text) if !text.trim().is_empty() => write_content_lines(writer, text),
        _ if options.emit_placeholder_for_missing_content => {
            write_paragraph(writer, Some("Normal"), &format!("{{{{{}}}}}", section.placeholder_id), true);
        }
        _ => {}
    }

    let child_level = (level + 1).min(MAX_HEADING_LEVEL);
    for sub_section in &section.sub_sections {
        write_section(writer, sub_section, child_level, content_blocks, options);
    }
}

/// Writes every `<w:p>` element for the section tree, in document order.
pub fn write_body(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    sections: &[Section],
    content_blocks: &[ContentBlock],
    options: &RenderOptions,
) {
    for section in sections {
        write_section(writer, section, 1, content_blocks, options);
    }
}
