//! Unicode range subsetting.

use std::{collections::BTreeSet, ops::Range, sync::OnceLock};

use fontedit::{EditableFont, GlyphId16};
use log::{debug, trace};
use regex::Regex;

use crate::error::Error;

fn range_expr() -> &'static Regex {
    static RANGE: OnceLock<Regex> = OnceLock::new();
    RANGE.get_or_init(|| {
        Regex::new(r"^\s*(?:[Uu]\+)?([0-9A-Fa-f]+)(?:-([0-9A-Fa-f]+))?\s*$").unwrap()
    })
}

/// Parse `XXXX` or `XXXX-YYYY` (hex, optionally `U+` prefixed).
///
/// The upper bound of the hyphenated form is exclusive: `41-43` is U+0041
/// and U+0042. A range whose end is not past its start is empty.
pub fn parse_range(expr: &str) -> Result<Range<u32>, Error> {
    let invalid = || Error::InvalidRange(expr.to_string());
    let captures = range_expr().captures(expr).ok_or_else(invalid)?;
    let hex = |s: &str| u32::from_str_radix(s, 16).map_err(|_| invalid());
    let start = hex(&captures[1])?;
    let end = match captures.get(2) {
        Some(end) => hex(end.as_str())?,
        None => start.checked_add(1).ok_or_else(invalid)?,
    };
    Ok(start..end)
}

/// Selects the glyphs to keep for a set of unicode ranges and removes the
/// rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetSelector {
    ranges: Vec<Range<u32>>,
}

impl SubsetSelector {
    pub fn new<S: AsRef<str>>(exprs: &[S]) -> Result<Self, Error> {
        let ranges = exprs
            .iter()
            .map(|expr| parse_range(expr.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SubsetSelector { ranges })
    }

    pub fn contains(&self, codepoint: u32) -> bool {
        self.ranges.iter().any(|range| range.contains(&codepoint))
    }

    /// The glyphs to keep: `.notdef`, every glyph with outlines mapped from a
    /// selected codepoint, and everything those glyphs reference.
    ///
    /// Codepoints the font doesn't map are skipped.
    pub fn selection(&self, font: &EditableFont) -> BTreeSet<GlyphId16> {
        let mut keep = BTreeSet::from([GlyphId16::NOTDEF]);
        for codepoint in font.codepoints().filter(|cp| self.contains(*cp)) {
            let Some(gid) = font.glyph_for_codepoint(codepoint) else {
                continue;
            };
            if !font.is_worth_outputting(gid) {
                trace!("U+{codepoint:04X} ({gid}) has no outline, not selected");
                continue;
            }
            trace!("Selected U+{codepoint:04X} ({gid})");
            keep.insert(gid);
            let mut pending = font.references(gid);
            while let Some(component) = pending.pop() {
                if keep.insert(component) {
                    trace!("Selected {component}, referenced from {gid}");
                    pending.extend(font.references(component));
                }
            }
        }
        keep
    }

    /// Remove every glyph outside [`selection`](Self::selection) along with
    /// the positioning and substitution rules that mention it.
    ///
    /// Returns how many glyphs were removed.
    pub fn apply(&self, font: &mut EditableFont) -> Result<usize, Error> {
        let keep = self.selection(font);
        let mut removed = 0;
        for gid in (1..font.glyph_count()).map(GlyphId16::new) {
            if keep.contains(&gid) {
                continue;
            }
            font.remove_pos_sub(gid)?;
            font.remove_glyph(gid)?;
            removed += 1;
        }
        debug!(
            "Subset kept {} of {} glyphs",
            keep.len(),
            font.glyph_count()
        );
        Ok(removed)
    }
}
