//! Glyph queries and the destructive glyph table edits.

use log::{debug, trace};
use skrifa::{
    outline::OutlinePen,
    prelude::{MetadataProvider, Size},
};
use write_fonts::{
    read::TopLevelTable,
    tables::{
        cmap::Cmap,
        glyf::{Glyf, Glyph, SimpleGlyph},
        hmtx::{Hmtx, LongMetric},
    },
    types::{GlyphId, GlyphId16},
};

use crate::{
    error::Error,
    font::{EditableFont, Outlines},
    outline,
};

const LOWERCASE_O: u32 = 0x6F;

/// Counts the path commands a glyph draws.
#[derive(Default)]
struct CountingPen(usize);

impl OutlinePen for CountingPen {
    fn move_to(&mut self, _x: f32, _y: f32) {}

    fn line_to(&mut self, _x: f32, _y: f32) {
        self.0 += 1;
    }

    fn quad_to(&mut self, _cx0: f32, _cy0: f32, _x: f32, _y: f32) {
        self.0 += 1;
    }

    fn curve_to(&mut self, _cx0: f32, _cy0: f32, _cx1: f32, _cy1: f32, _x: f32, _y: f32) {
        self.0 += 1;
    }

    fn close(&mut self) {}
}

impl EditableFont {
    /// Every codepoint the character map covers, ascending.
    pub fn codepoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.cmap.keys().copied()
    }

    pub fn glyph_for_codepoint(&self, codepoint: u32) -> Option<GlyphId16> {
        self.cmap.get(&codepoint).copied()
    }

    /// Whether the font maps a lowercase latin o.
    ///
    /// Fonts without one are treated as symbol fonts when hinting.
    pub fn has_lowercase_o(&self) -> bool {
        self.glyph_for_codepoint(LOWERCASE_O).is_some()
    }

    fn check_gid(&self, gid: GlyphId16) -> Result<usize, Error> {
        let idx = gid.to_u16() as usize;
        if idx >= self.glyph_count() as usize {
            return Err(Error::GlyphOutOfRange(idx as u32));
        }
        Ok(idx)
    }

    /// True if the glyph draws something: it has contours or components.
    pub fn is_worth_outputting(&self, gid: GlyphId16) -> bool {
        match self.outlines() {
            Outlines::TrueType => match self.glyphs.get(gid.to_u16() as usize) {
                Some(Glyph::Simple(simple)) => !simple.contours.is_empty(),
                Some(Glyph::Composite(_)) => true,
                Some(Glyph::Empty) | None => false,
            },
            Outlines::Cff => {
                let Ok(font) = self.source() else {
                    return false;
                };
                let Some(glyph) = font.outline_glyphs().get(GlyphId::from(gid)) else {
                    return false;
                };
                let mut pen = CountingPen::default();
                glyph.draw(Size::unscaled(), &mut pen).is_ok() && pen.0 > 0
            }
        }
    }

    /// The glyphs a composite glyph is built from, in component order.
    pub fn references(&self, gid: GlyphId16) -> Vec<GlyphId16> {
        match self.glyphs.get(gid.to_u16() as usize) {
            Some(Glyph::Composite(composite)) => composite
                .components()
                .iter()
                .map(|component| component.glyph)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Empty a glyph and unmap it.
    ///
    /// Glyph ids don't shift: the slot stays with no outline and zero
    /// metrics. `.notdef` is never removed.
    pub fn remove_glyph(&mut self, gid: GlyphId16) -> Result<(), Error> {
        let idx = self.check_gid(gid)?;
        if idx == 0 {
            return Ok(());
        }
        trace!("Removing glyph {gid}");
        if let Some(glyph) = self.glyphs.get_mut(idx) {
            *glyph = Glyph::Empty;
            self.touch(Glyf::TAG);
        }
        if let Some(metric) = self.metrics.get_mut(idx) {
            *metric = LongMetric::default();
            self.touch(Hmtx::TAG);
        }
        let before = self.cmap.len();
        self.cmap.retain(|_, mapped| *mapped != gid);
        if self.cmap.len() != before {
            self.touch(Cmap::TAG);
        }
        Ok(())
    }

    /// Apply `fix` to every simple glyph, returning how many changed.
    fn fix_simple_glyphs(&mut self, fix: impl Fn(&mut SimpleGlyph) -> bool) -> Result<usize, Error> {
        self.require_truetype()?;
        let mut changed = 0;
        for glyph in self.glyphs.iter_mut() {
            let Glyph::Simple(simple) = glyph else {
                continue;
            };
            if fix(simple) {
                simple.instructions.clear();
                simple.recompute_bounding_box();
                changed += 1;
            }
        }
        if changed > 0 {
            self.touch(Glyf::TAG);
        }
        Ok(changed)
    }

    /// Orient outer contours clockwise and counters counter-clockwise.
    pub fn correct_direction(&mut self) -> Result<usize, Error> {
        let changed = self.fix_simple_glyphs(outline::correct_direction)?;
        debug!("Reversed contours in {changed} glyphs");
        Ok(changed)
    }

    /// Add on-curve points at the extrema of every curve.
    pub fn add_extrema(&mut self) -> Result<usize, Error> {
        let changed = self.fix_simple_glyphs(outline::add_extrema)?;
        debug!("Added extrema to {changed} glyphs");
        Ok(changed)
    }

    /// Put every point on the integer grid.
    ///
    /// TrueType coordinates are integers and points created by other edits
    /// are rounded as they are made, so there is never anything to do.
    pub fn round_to_int(&mut self) -> Result<usize, Error> {
        self.require_truetype()?;
        Ok(0)
    }

    /// Decompose composites whose component transforms rasterize badly.
    pub fn correct_references(&mut self) -> Result<usize, Error> {
        self.require_truetype()?;
        let problematic = self
            .glyphs
            .iter()
            .enumerate()
            .filter(|(_, glyph)| match glyph {
                Glyph::Composite(composite) => {
                    composite.components().iter().any(outline::is_problematic)
                }
                _ => false,
            })
            .map(|(gid, _)| GlyphId16::new(gid as u16))
            .collect::<Vec<_>>();
        let mut changed = 0;
        for gid in problematic {
            let Some(simple) = outline::decompose(&self.glyphs, gid) else {
                continue;
            };
            trace!("Decomposed glyph {gid}");
            self.glyphs[gid.to_u16() as usize] = simple;
            changed += 1;
        }
        if changed > 0 {
            self.touch(Glyf::TAG);
        }
        debug!("Decomposed {changed} composite glyphs");
        Ok(changed)
    }
}
