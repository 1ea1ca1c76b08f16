//! Rebuilding inconsistent font names.

use std::sync::OnceLock;

use fontedit::EditableFont;
use log::debug;
use regex::Regex;

use crate::error::Error;

// Assigned before the final names so no final name is ever set while an
// identical one is still current.
const PLACEHOLDER_FONTNAME: &str = "FontPrep-Placeholder";
const PLACEHOLDER_FULLNAME: &str = "FontPrep Placeholder";
const PLACEHOLDER_FAMILYNAME: &str = "FontPrep";

fn fontname_expr() -> &'static Regex {
    static FONTNAME: OnceLock<Regex> = OnceLock::new();
    FONTNAME.get_or_init(|| Regex::new(r"^(\w+)(?:-(\S+))?$").unwrap())
}

/// The name that family and style were recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// Family name followed by the style in the full name
    FullName,
    /// `Family-Style` in the PostScript name
    FontName,
}

/// A font's family and style as recovered from its existing names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub family: String,
    pub style: Option<String>,
    pub source: NameSource,
}

/// The name triple written back to the font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontNames {
    pub fontname: String,
    pub fullname: String,
    pub familyname: String,
}

/// `familyname` as a leading prefix of `fullname`, optionally followed by
/// one separator; the rest is the style.
fn split_fullname(familyname: &str, fullname: &str) -> Option<(String, Option<String>)> {
    if familyname.is_empty() {
        return None;
    }
    let rest = fullname.strip_prefix(familyname)?;
    let rest = match rest.chars().next() {
        Some(c) if !(c.is_alphanumeric() || c == '_') => &rest[c.len_utf8()..],
        _ => rest,
    };
    let style = (!rest.is_empty()).then(|| rest.to_string());
    Some((familyname.to_string(), style))
}

/// `Family-Style` or a bare `Family`.
fn split_fontname(fontname: &str) -> Option<(String, Option<String>)> {
    let captures = fontname_expr().captures(fontname)?;
    Some((
        captures[1].to_string(),
        captures.get(2).map(|m| m.as_str().to_string()),
    ))
}

/// Recover family and style, preferring the full name.
pub fn parse_names(
    fontname: Option<&str>,
    fullname: Option<&str>,
    familyname: Option<&str>,
) -> Result<ParsedName, Error> {
    if let Some((family, style)) = familyname
        .zip(fullname)
        .and_then(|(familyname, fullname)| split_fullname(familyname, fullname))
    {
        return Ok(ParsedName {
            family,
            style,
            source: NameSource::FullName,
        });
    }
    if let Some((family, style)) = fontname.and_then(split_fontname) {
        return Ok(ParsedName {
            family,
            style,
            source: NameSource::FontName,
        });
    }
    Err(Error::NameRepair)
}

/// Rebuild the name triple from what [`parse_names`] recovered.
///
/// A PostScript name already of the `Family-Style` shape is kept, as is a
/// full name the family was found in.
pub fn rebuild_names(parsed: &ParsedName, fontname: Option<&str>, fullname: Option<&str>) -> FontNames {
    let fontname = match fontname.filter(|name| fontname_expr().is_match(name)) {
        Some(name) => name.to_string(),
        None => {
            let mut name = parsed.family.clone();
            if let Some(style) = &parsed.style {
                name.push('-');
                name.push_str(style);
            }
            name.replace(' ', "")
        }
    };
    let fullname = match (parsed.source, fullname) {
        (NameSource::FullName, Some(name)) => name.to_string(),
        _ => match &parsed.style {
            Some(style) => format!("{} {style}", parsed.family),
            None => parsed.family.clone(),
        },
    };
    FontNames {
        fontname,
        fullname,
        familyname: parsed.family.clone(),
    }
}

/// Make the PostScript, full and family names of a font agree.
pub struct NameRepairer;

impl NameRepairer {
    pub fn repair(font: &mut EditableFont) -> Result<FontNames, Error> {
        let fontname = font.fontname();
        let fullname = font.fullname();
        let familyname = font.familyname();
        let parsed = parse_names(
            fontname.as_deref(),
            fullname.as_deref(),
            familyname.as_deref(),
        )?;
        let names = rebuild_names(&parsed, fontname.as_deref(), fullname.as_deref());
        debug!("Repairing names from {:?}: {parsed:?} gives {names:?}", parsed.source);

        font.set_fontname(PLACEHOLDER_FONTNAME)?;
        font.set_fullname(PLACEHOLDER_FULLNAME)?;
        font.set_familyname(PLACEHOLDER_FAMILYNAME)?;
        font.set_fontname(&names.fontname)?;
        font.set_fullname(&names.fullname)?;
        font.set_familyname(&names.familyname)?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn font(family: Option<&str>, full: Option<&str>, postscript: Option<&str>) -> EditableFont {
        EditableFont::from_bytes(test_fonts::with_names(family, full, postscript)).unwrap()
    }

    #[test]
    fn style_follows_family_in_fullname() {
        let parsed = parse_names(None, Some("Roboto Bold"), Some("Roboto")).unwrap();
        assert_eq!(
            ParsedName {
                family: "Roboto".to_string(),
                style: Some("Bold".to_string()),
                source: NameSource::FullName,
            },
            parsed
        );
        let names = rebuild_names(&parsed, None, Some("Roboto Bold"));
        assert_eq!("Roboto-Bold", names.fontname);
        assert_eq!("Roboto Bold", names.fullname);
        assert_eq!("Roboto", names.familyname);
    }

    #[test]
    fn fullname_without_separator() {
        let parsed = parse_names(None, Some("RobotoBold"), Some("Roboto")).unwrap();
        assert_eq!(Some("Bold".to_string()), parsed.style);
    }

    #[test]
    fn fullname_that_is_just_the_family() {
        let parsed = parse_names(None, Some("Roboto"), Some("Roboto")).unwrap();
        assert_eq!(None, parsed.style);
        assert_eq!(
            "Roboto",
            rebuild_names(&parsed, None, Some("Roboto")).fontname
        );
    }

    #[test]
    fn falls_back_to_fontname() {
        let parsed =
            parse_names(Some("Roboto-Bold"), Some("Something Else"), Some("Roboto Sans"))
                .unwrap();
        assert_eq!(
            ParsedName {
                family: "Roboto".to_string(),
                style: Some("Bold".to_string()),
                source: NameSource::FontName,
            },
            parsed
        );
        let names = rebuild_names(&parsed, Some("Roboto-Bold"), Some("Something Else"));
        assert_eq!(
            FontNames {
                fontname: "Roboto-Bold".to_string(),
                fullname: "Roboto Bold".to_string(),
                familyname: "Roboto".to_string(),
            },
            names
        );
    }

    #[test]
    fn nothing_to_go_on() {
        let err = parse_names(Some("Not A PostScript Name"), Some("Whatever"), None).unwrap_err();
        assert!(matches!(err, Error::NameRepair));
        assert_eq!(400, err.code());
        assert!(matches!(
            parse_names(None, None, None),
            Err(Error::NameRepair)
        ));
    }

    #[test]
    fn rebuilt_fontname_has_no_spaces() {
        let parsed = parse_names(None, Some("Open Sans Semi Bold"), Some("Open Sans")).unwrap();
        let names = rebuild_names(&parsed, Some("Open Sans"), Some("Open Sans Semi Bold"));
        assert_eq!("OpenSans-SemiBold", names.fontname);
        assert_eq!("Open Sans Semi Bold", names.fullname);
    }

    #[test]
    fn repairs_font_names() {
        let mut font = font(Some("Roboto"), Some("Roboto Bold"), None);
        let names = NameRepairer::repair(&mut font).unwrap();

        let font = EditableFont::from_bytes(font.to_bytes().unwrap()).unwrap();
        assert_eq!(Some(names.fontname), font.fontname());
        assert_eq!(Some("Roboto-Bold".to_string()), font.fontname());
        assert_eq!(Some("Roboto Bold".to_string()), font.fullname());
        assert_eq!(Some("Roboto".to_string()), font.familyname());
    }

    #[test]
    fn names_equal_to_current_ones_are_fine() {
        let mut font = font(
            Some(test_fonts::FAMILY_NAME),
            Some(test_fonts::FULL_NAME),
            Some(test_fonts::POSTSCRIPT_NAME),
        );
        NameRepairer::repair(&mut font).unwrap();
        assert_eq!(Some(test_fonts::POSTSCRIPT_NAME.to_string()), font.fontname());
        assert_eq!(Some(test_fonts::FULL_NAME.to_string()), font.fullname());
        assert_eq!(Some(test_fonts::FAMILY_NAME.to_string()), font.familyname());
    }

    #[test]
    fn unrepairable_font_is_untouched() {
        let mut font = font(None, Some("Mystery"), Some("Not Parseable"));
        assert!(matches!(
            NameRepairer::repair(&mut font),
            Err(Error::NameRepair)
        ));
        assert!(!font.is_edited());
    }
}
