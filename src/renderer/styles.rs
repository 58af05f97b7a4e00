//! Style-part emission (spec §4.8 step 1): `Normal` plus `Heading1..6`,
//! each `BasedOn "Normal"`, sourcing fonts from `VisualTheme.FontMap` with
//! the documented fallback chain.

use crate::model::{FontDefinition, FontWeight, VisualTheme, font_map};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::color;

fn default_normal() -> FontDefinition {
    FontDefinition {
        family: "Calibri".to_string(),
        size_pt: 11.0,
        weight: FontWeight::Normal,
        color: "000000".to_string(),
    }
}

fn heading_fallback(level: u8) -> FontDefinition {
    FontDefinition {
        family: "Calibri".to_string(),
        size_pt: (22 - 2 * level as i32).max(14) as f64,
        weight: FontWeight::Bold,
        color: "000000".to_string(),
    }
}

fn resolve_normal(theme: &VisualTheme) -> FontDefinition {
    font_map::get(&theme.font_map, "Normal")
        .cloned()
        .unwrap_or_else(default_normal)
}

fn resolve_heading(theme: &VisualTheme, level: u8) -> FontDefinition {
    font_map::get(&theme.font_map, &format!("heading {level}"))
        .or_else(|| font_map::get(&theme.font_map, "Title"))
        .or_else(|| font_map::get(&theme.font_map, "Normal"))
        .cloned()
        .unwrap_or_else(|| heading_fallback(level))
}

/// Writes one `<w:style>` element's run properties in the required order:
/// `RunFonts, Bold/Italic/Underline, FontSize, FontSizeComplexScript, Color`.
fn write_run_properties(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    font: &FontDefinition,
    force_bold: bool,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;

    let mut fonts = BytesStart::new("w:rFonts");
    fonts.push_attribute(("w:ascii", font.family.as_str()));
    fonts.push_attribute(("w:hAnsi", font.family.as_str()));
    fonts.push_attribute(("w:cs", font.family.as_str()));
    writer.write_event(Event::Empty(fonts))?;

    if force_bold || font.weight == FontWeight::Bold {
        writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
    }

    let half_points = (font.size_pt * 2.0).round() as i64;
    let mut sz = BytesStart::new("w:sz");
    sz.push_attribute(("w:val", half_points.to_string().as_str()));
    writer.write_event(Event::Empty(sz))?;

    let mut sz_cs = BytesStart::new("w:szCs");
    sz_cs.push_attribute(("w:val", half_points.to_string().as_str()));
    writer.write_event(Event::Empty(sz_cs))?;

    let mut color_el = BytesStart::new("w:color");
    color_el.push_attribute(("w:val", color::normalize(&font.color).as_str()));
    writer.write_event(Event::Empty(color_el))?;

    writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    Ok(())
}

fn write_style(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    style_id: &str,
    display_name: &str,
    based_on: Option<&str>,
    font: &FontDefinition,
    force_bold: bool,
) -> quick_xml::Result<()> {
    let mut style = BytesStart::new("w:style");
    style.push_attribute(("w:type", "paragraph"));
    style.push_attribute(("w:styleId", style_id));
    writer.write_event(Event::Start(style))?;

    let mut name = BytesStart::new("w:name");
    name.push_attribute(("w:val", display_name));
    writer.write_event(Event::Empty(name))?;

    if let Some(based_on) = based_on {
        let mut based = BytesStart::new("w:basedOn");
        based.push_attribute(("w:val", based_on));
        writer.write_event(Event::Empty(based))?;
    }

    write_run_properties(writer, font, force_bold)?;

    writer.write_event(Event::End(BytesEnd::new("w:style")))?;
    Ok(())
}

/// Builds the complete `word/styles.xml` part.
pub fn build_styles_xml(theme: &VisualTheme) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Text(BytesText::from_escaped(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        )))
        .unwrap();

    let mut styles = BytesStart::new("w:styles");
    styles.push_attribute((
        "xmlns:w",
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    ));
    writer.write_event(Event::Start(styles)).unwrap();

    let normal = resolve_normal(theme);
    write_style(&mut writer, "Normal", "Normal", None, &normal, false).unwrap();

    for level in 1..=6u8 {
        let font = resolve_heading(theme, level);
        write_style(
            &mut writer,
            &format!("Heading{level}"),
            &format!("heading {level}"),
            Some("Normal"),
            &font,
            true,
        )
        .unwrap();
    }

    writer.write_event(Event::End(BytesEnd::new("w:styles"))).unwrap();

    String::from_utf8(writer.into_inner().into_inner()).unwrap()
}
