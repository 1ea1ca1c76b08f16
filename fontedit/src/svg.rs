//! SVG font export.
//!
//! The `<font-face>` element is written before any glyph so that its
//! attributes sit at the very start of the document.

use std::fmt::Write;

use skrifa::{
    outline::{DrawSettings, OutlinePen},
    prelude::{LocationRef, MetadataProvider, Size},
};
use write_fonts::{
    read::{
        tables::{head::MacStyle, os2::SelectionFlags},
        FontRef,
    },
    types::GlyphId,
};

use crate::{error::Error, font::EditableFont};

/// Accumulates SVG path data in font units.
#[derive(Default)]
struct SvgPathPen(String);

fn num(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i32)
    } else {
        format!("{value}")
    }
}

impl SvgPathPen {
    fn command(&mut self, cmd: char, coords: &[f32]) {
        self.0.push(cmd);
        let coords = coords.iter().map(|c| num(*c)).collect::<Vec<_>>();
        self.0.push_str(&coords.join(" "));
    }
}

impl OutlinePen for SvgPathPen {
    fn move_to(&mut self, x: f32, y: f32) {
        self.command('M', &[x, y]);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.command('L', &[x, y]);
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.command('Q', &[cx0, cy0, x, y]);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.command('C', &[cx0, cy0, cx1, cy1, x, y]);
    }

    fn close(&mut self) {
        self.0.push('Z');
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() || (c.is_whitespace() && c != ' ') => {
                let _ = write!(escaped, "&#x{:X};", c as u32);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// The CSS `font-stretch` keyword for an OS/2 width class.
fn stretch(width_class: u16) -> &'static str {
    match width_class {
        1 => "ultra-condensed",
        2 => "extra-condensed",
        3 => "condensed",
        4 => "semi-condensed",
        6 => "semi-expanded",
        7 => "expanded",
        8 => "extra-expanded",
        9 => "ultra-expanded",
        _ => "normal",
    }
}

fn unicode_range(font: &EditableFont) -> Option<String> {
    let first = font.codepoints().next()?;
    let last = font.codepoints().last()?;
    if first == last {
        return Some(format!("U+{first:X}"));
    }
    Some(format!("U+{first:X}-{last:X}"))
}

fn glyph_path(font: &FontRef, gid: GlyphId) -> String {
    let mut pen = SvgPathPen::default();
    if let Some(glyph) = font.outline_glyphs().get(gid) {
        // an undrawable glyph is written without an outline
        let settings = DrawSettings::unhinted(Size::unscaled(), LocationRef::default());
        if glyph.draw(settings, &mut pen).is_err() {
            pen.0.clear();
        }
    }
    pen.0
}

/// Render the current state of `font` as an SVG font document.
pub(crate) fn svg_font(font: &EditableFont) -> Result<String, Error> {
    let bytes = font.to_bytes()?;
    let compiled = FontRef::new(&bytes)?;
    let advances = compiled.glyph_metrics(Size::unscaled(), LocationRef::default());
    let advance = |gid: GlyphId| advances.advance_width(gid).unwrap_or_default();

    let family = font
        .familyname()
        .or_else(|| font.fontname())
        .unwrap_or_default();
    let id = font.fontname().unwrap_or_else(|| family.replace(' ', ""));
    let (weight, width_class, os2_italic) = match &font.os2 {
        Some(os2) => (
            os2.us_weight_class,
            os2.us_width_class,
            os2.fs_selection.contains(SelectionFlags::ITALIC),
        ),
        None => (400, 5, false),
    };
    let italic = os2_italic || font.head.mac_style.contains(MacStyle::ITALIC);
    let (ascent, descent) = match (&font.hhea, &font.os2) {
        (Some(hhea), _) => (hhea.ascender.to_i16() as i32, hhea.descender.to_i16() as i32),
        (None, Some(os2)) => (os2.s_typo_ascender as i32, os2.s_typo_descender as i32),
        (None, None) => (font.units_per_em() as i32, 0),
    };

    let mut svg = String::new();
    svg.push_str("<?xml version=\"1.0\" standalone=\"no\"?>\n");
    svg.push_str("<svg xmlns=\"http://www.w3.org/2000/svg\">\n<defs>\n");
    let _ = writeln!(
        svg,
        "<font id=\"{}\" horiz-adv-x=\"{}\">",
        escape(&id),
        num(advance(GlyphId::NOTDEF))
    );
    let _ = write!(
        svg,
        "<font-face font-family=\"{}\" font-weight=\"{weight}\" font-style=\"{}\" \
         font-stretch=\"{}\" units-per-em=\"{}\" ascent=\"{ascent}\" descent=\"{descent}\"",
        escape(&family),
        if italic { "italic" } else { "normal" },
        stretch(width_class),
        font.units_per_em(),
    );
    if let Some(range) = unicode_range(font) {
        let _ = write!(svg, " unicode-range=\"{range}\"");
    }
    svg.push_str("/>\n");

    let _ = writeln!(
        svg,
        "<missing-glyph horiz-adv-x=\"{}\" d=\"{}\"/>",
        num(advance(GlyphId::NOTDEF)),
        glyph_path(&compiled, GlyphId::NOTDEF)
    );
    for codepoint in font.codepoints() {
        let (Some(c), Some(gid)) = (char::from_u32(codepoint), font.glyph_for_codepoint(codepoint))
        else {
            continue;
        };
        let gid = GlyphId::from(gid);
        let _ = write!(
            svg,
            "<glyph unicode=\"{}\" horiz-adv-x=\"{}\"",
            escape(&c.to_string()),
            num(advance(gid))
        );
        let path = glyph_path(&compiled, gid);
        if !path.is_empty() {
            let _ = write!(svg, " d=\"{path}\"");
        }
        svg.push_str("/>\n");
    }
    svg.push_str("</font>\n</defs>\n</svg>\n");
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn font_face_leads_the_document() {
        let font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        let svg = svg_font(&font).unwrap();
        let head = String::from_utf8_lossy(&svg.as_bytes()[..1024.min(svg.len())]);
        assert!(head.contains("font-family=\"Test Sans\""), "{head}");
        assert!(head.contains("font-weight=\"400\""), "{head}");
        assert!(head.contains("font-style=\"normal\""), "{head}");
        assert!(head.contains("font-stretch=\"normal\""), "{head}");
        assert!(head.contains("unicode-range=\"U+20-FB01\""), "{head}");
    }

    #[test]
    fn every_mapped_codepoint_has_a_glyph() {
        let font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        let svg = svg_font(&font).unwrap();
        assert_eq!(font.codepoints().count(), svg.matches("<glyph ").count());
        assert!(svg.contains("<glyph unicode=\"A\""));
        // the composite is flattened into path data
        let aacute = svg
            .lines()
            .find(|line| line.starts_with("<glyph unicode=\"Á\""))
            .unwrap();
        assert!(aacute.contains(" d=\"M"), "{aacute}");
    }

    #[test]
    fn italic_and_width_are_reported() {
        let mut font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        let os2 = font.os2.as_mut().unwrap();
        os2.fs_selection = SelectionFlags::ITALIC;
        os2.us_width_class = 3;
        os2.us_weight_class = 700;
        let svg = svg_font(&font).unwrap();
        assert!(svg.contains("font-style=\"italic\""));
        assert!(svg.contains("font-stretch=\"condensed\""));
        assert!(svg.contains("font-weight=\"700\""));
    }

    #[test]
    fn markup_is_escaped() {
        assert_eq!("a&amp;b&lt;&quot;&#xA;", escape("a&b<\"\n"));
        assert_eq!("1.5", num(1.5));
        assert_eq!("-20", num(-20.0));
    }
}
