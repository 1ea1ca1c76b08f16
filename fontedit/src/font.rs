//! The owned, editable font.
//!
//! Tables the editing operations touch are held as owned
//! [write-fonts](https://docs.rs/write-fonts) values. When the font is saved the
//! edited tables are compiled and everything else is copied from the source
//! bytes unchanged.

use std::{
    collections::{BTreeMap, BTreeSet},
    env, fmt, fs,
    path::Path,
};

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use skrifa::charmap::Charmap;
use write_fonts::{
    from_obj::{FromTableRef, ToOwnedTable},
    read::{tables::compute_checksum, FileRef, FontRef, TableProvider, TopLevelTable},
    tables::{
        cmap::Cmap,
        glyf::{Contour, GlyfLocaBuilder, Glyf, Glyph},
        gpos::Gpos,
        gsub::Gsub,
        head::Head,
        hhea::Hhea,
        hmtx::{Hmtx, LongMetric},
        loca::LocaFormat,
        maxp::Maxp,
        name::Name,
        os2::Os2,
    },
    types::{GlyphId, GlyphId16, LongDateTime, Tag},
    FontBuilder,
};

use crate::{error::Error, metrics::MetricDeltas, names, svg, woff};

const OTTO: [u8; 4] = *b"OTTO";
const CFF: Tag = Tag::new(b"CFF ");
const CFF2: Tag = Tag::new(b"CFF2");

// The TrueType epoch (1st January 1904) as a Unix timestamp.
const MACINTOSH_EPOCH: i64 = -2082844800;

/// The kind of outlines a font carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlines {
    /// Quadratic outlines in `glyf`/`loca`
    TrueType,
    /// Cubic outlines in `CFF ` or `CFF2`
    Cff,
}

/// Representations [EditableFont::generate] can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Ttf,
    Otf,
    Woff,
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Ttf => "ttf",
            OutputFormat::Otf => "otf",
            OutputFormat::Woff => "woff",
            OutputFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// GSUB and GPOS, taken into owned form the first time a rule is pruned.
#[derive(Default)]
pub(crate) struct Layout {
    pub(crate) gsub: Option<Gsub>,
    pub(crate) gpos: Option<Gpos>,
}

/// An sfnt font opened for editing.
///
/// The value exclusively owns its data; it is deliberately not `Clone`.
pub struct EditableFont {
    data: Vec<u8>,
    outlines: Outlines,
    pub(crate) head: Head,
    pub(crate) maxp: Maxp,
    pub(crate) hhea: Option<Hhea>,
    pub(crate) os2: Option<Os2>,
    pub(crate) name: Option<Name>,
    pub(crate) cmap: BTreeMap<u32, GlyphId16>,
    /// One entry per glyph, empty if the font has no `hmtx`
    pub(crate) metrics: Vec<LongMetric>,
    /// One entry per glyph for TrueType fonts, empty for CFF
    pub(crate) glyphs: Vec<Glyph>,
    pub(crate) layout: Option<Layout>,
    pub(crate) deltas: MetricDeltas,
    edited: BTreeSet<Tag>,
}

impl fmt::Debug for EditableFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditableFont")
            .field("outlines", &self.outlines)
            .field("num_glyphs", &self.maxp.num_glyphs)
            .field("edited", &self.edited)
            .finish()
    }
}

impl EditableFont {
    /// Open the font at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, Error> {
        let tables = {
            let font = match FileRef::new(&data)? {
                FileRef::Font(font) => font,
                FileRef::Collection(_) => return Err(Error::Collection),
            };
            SourceTables::read(&font)?
        };
        debug!(
            "Loaded {:?} font with {} glyphs",
            tables.outlines, tables.maxp.num_glyphs
        );
        Ok(EditableFont {
            data,
            outlines: tables.outlines,
            head: tables.head,
            maxp: tables.maxp,
            hhea: tables.hhea,
            os2: tables.os2,
            name: tables.name,
            cmap: tables.cmap,
            metrics: tables.metrics,
            glyphs: tables.glyphs,
            layout: None,
            deltas: MetricDeltas::default(),
            edited: BTreeSet::new(),
        })
    }

    pub fn outlines(&self) -> Outlines {
        self.outlines
    }

    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    pub fn glyph_count(&self) -> u16 {
        self.maxp.num_glyphs
    }

    /// Whether anything has changed since the font was loaded.
    pub fn is_edited(&self) -> bool {
        !self.edited.is_empty()
    }

    pub(crate) fn touch(&mut self, tag: Tag) {
        self.edited.insert(tag);
    }

    /// A view of the source bytes the font was loaded from.
    pub(crate) fn source(&self) -> Result<FontRef<'_>, Error> {
        Ok(FontRef::new(&self.data)?)
    }

    pub(crate) fn require_truetype(&self) -> Result<(), Error> {
        match self.outlines {
            Outlines::TrueType => Ok(()),
            Outlines::Cff => Err(Error::UnsupportedOutlines),
        }
    }

    /// Write the engine's lossless native form, the rebuilt sfnt.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| Error::io(path, e))
    }

    /// Write `format` to `path`.
    pub fn generate(&self, format: OutputFormat, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let bytes = match (format, self.outlines) {
            (OutputFormat::Ttf, Outlines::TrueType) | (OutputFormat::Otf, Outlines::Cff) => {
                self.to_bytes()?
            }
            (OutputFormat::Ttf, Outlines::Cff) | (OutputFormat::Otf, Outlines::TrueType) => {
                return Err(Error::UnsupportedConversion {
                    format: format.extension(),
                })
            }
            (OutputFormat::Woff, _) => woff::wrap(&self.to_bytes()?)?,
            (OutputFormat::Svg, _) => svg::svg_font(self)?.into_bytes(),
        };
        debug!("Generated {format} of {} bytes at {path:?}", bytes.len());
        fs::write(path, bytes).map_err(|e| Error::io(path, e))
    }

    /// Compile the current state of the font.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        if self.edited.is_empty() {
            return Ok(self.data.clone());
        }
        let font = self.source()?;
        let mut builder = FontBuilder::new();

        let mut head = self.head.clone();
        head.modified = LongDateTime::new(current_timestamp());

        if self.edited.contains(&Glyf::TAG) {
            let mut glyf_loca = GlyfLocaBuilder::new();
            for glyph in self.glyphs.iter() {
                glyf_loca
                    .add_glyph(glyph)
                    .map_err(|source| Error::Dump {
                        table: Glyf::TAG,
                        source,
                    })?;
            }
            let (glyf, loca, loca_format) = glyf_loca.build();
            head.index_to_loc_format = match loca_format {
                LocaFormat::Short => 0,
                LocaFormat::Long => 1,
            };
            let mut maxp = self.maxp.clone();
            update_maxp(&mut maxp, &self.glyphs);
            builder.add_table(&glyf)?;
            builder.add_table(&loca)?;
            builder.add_table(&maxp)?;
        }
        builder.add_table(&head)?;

        if self.edited.contains(&Hmtx::TAG) {
            let (hmtx, number_of_h_metrics) = compile_hmtx(&self.metrics);
            let mut hhea = self.hhea.clone().ok_or(Error::MissingTable(Hhea::TAG))?;
            hhea.number_of_h_metrics = number_of_h_metrics;
            builder.add_table(&hmtx)?;
            builder.add_table(&hhea)?;
        } else if self.edited.contains(&Hhea::TAG) {
            if let Some(hhea) = &self.hhea {
                builder.add_table(hhea)?;
            }
        }
        if self.edited.contains(&Os2::TAG) {
            if let Some(os2) = &self.os2 {
                builder.add_table(os2)?;
            }
        }
        if self.edited.contains(&Name::TAG) {
            if let Some(name) = &self.name {
                builder.add_table(&names::compile(name))?;
            }
        }
        if self.edited.contains(&Cmap::TAG) {
            let cmap = Cmap::from_mappings(self.cmap.iter().filter_map(|(cp, gid)| {
                char::from_u32(*cp).map(|c| (c, GlyphId::from(*gid)))
            }))?;
            builder.add_table(&cmap)?;
        }
        if let Some(layout) = &self.layout {
            if self.edited.contains(&Gsub::TAG) {
                if let Some(gsub) = &layout.gsub {
                    builder.add_table(gsub)?;
                }
            }
            if self.edited.contains(&Gpos::TAG) {
                if let Some(gpos) = &layout.gpos {
                    builder.add_table(gpos)?;
                }
            }
        }

        builder.copy_missing_tables(font);
        let mut bytes = builder.build();
        if self.outlines == Outlines::Cff {
            bytes[..4].copy_from_slice(&OTTO);
            adjust_checksum(&mut bytes)?;
        }
        Ok(bytes)
    }
}

/// The owned tables extracted from a freshly loaded font.
struct SourceTables {
    outlines: Outlines,
    head: Head,
    maxp: Maxp,
    hhea: Option<Hhea>,
    os2: Option<Os2>,
    name: Option<Name>,
    cmap: BTreeMap<u32, GlyphId16>,
    metrics: Vec<LongMetric>,
    glyphs: Vec<Glyph>,
}

impl SourceTables {
    fn read(font: &FontRef) -> Result<Self, Error> {
        let head: Head = font.head()?.to_owned_table();
        let maxp: Maxp = font.maxp()?.to_owned_table();
        let num_glyphs = maxp.num_glyphs;

        let outlines = if font.table_data(Glyf::TAG).is_some() {
            Outlines::TrueType
        } else if font.table_data(CFF).is_some() || font.table_data(CFF2).is_some() {
            Outlines::Cff
        } else {
            return Err(Error::MissingTable(Glyf::TAG));
        };

        let glyphs = match outlines {
            Outlines::TrueType => {
                let loca = font.loca(None)?;
                let glyf = font.glyf()?;
                (0..num_glyphs)
                    .map(|gid| {
                        Ok(loca
                            .get_glyf(GlyphId::new(gid as u32), &glyf)?
                            .map(|glyph| Glyph::from_table_ref(&glyph))
                            .unwrap_or(Glyph::Empty))
                    })
                    .collect::<Result<Vec<_>, Error>>()?
            }
            Outlines::Cff => Vec::new(),
        };

        let metrics = match font.hmtx() {
            Ok(hmtx) => (0..num_glyphs)
                .map(|gid| {
                    let gid = GlyphId::new(gid as u32);
                    LongMetric {
                        advance: hmtx.advance(gid).unwrap_or_default(),
                        side_bearing: hmtx.side_bearing(gid).unwrap_or_default(),
                    }
                })
                .collect(),
            Err(e) => {
                warn!("Unable to read hmtx, advances are unavailable: {e}");
                Vec::new()
            }
        };

        let cmap = Charmap::new(font)
            .mappings()
            .filter_map(|(cp, gid)| GlyphId16::try_from(gid).ok().map(|gid| (cp, gid)))
            .collect();

        Ok(SourceTables {
            outlines,
            head,
            maxp,
            hhea: font.hhea().ok().map(|t| t.to_owned_table()),
            os2: font.os2().ok().map(|t| t.to_owned_table()),
            name: font.name().ok().map(|t| t.to_owned_table()),
            cmap,
            metrics,
            glyphs,
        })
    }
}

fn update_maxp(maxp: &mut Maxp, glyphs: &[Glyph]) {
    // version 0.5 carries no glyph limits
    if maxp.max_points.is_none() {
        return;
    }
    let (points, contours) = glyphs
        .iter()
        .filter_map(|glyph| match glyph {
            Glyph::Simple(simple) => Some((
                simple.contours.iter().map(Contour::len).sum::<usize>(),
                simple.contours.len(),
            )),
            _ => None,
        })
        .fold((0, 0), |(p, c), (gp, gc)| (p.max(gp), c.max(gc)));
    maxp.max_points = Some(points.min(u16::MAX as usize) as u16);
    maxp.max_contours = Some(contours.min(u16::MAX as usize) as u16);
}

/// Compile per-glyph metrics, folding a trailing run of equal advances
/// into left side bearings only.
fn compile_hmtx(metrics: &[LongMetric]) -> (Hmtx, u16) {
    let mut long_metrics = metrics.to_vec();
    let num_lsb_only = match long_metrics.last() {
        Some(last) => {
            let last_advance = last.advance;
            let run = long_metrics
                .iter()
                .rev()
                .take_while(|m| m.advance == last_advance)
                .count();
            // the last long metric carries the repeated advance
            run - 1
        }
        None => 0,
    };
    let lsbs = long_metrics
        .split_off(long_metrics.len() - num_lsb_only)
        .into_iter()
        .map(|metric| metric.side_bearing)
        .collect();
    let number_of_h_metrics = long_metrics.len() as u16;
    (Hmtx::new(long_metrics, lsbs), number_of_h_metrics)
}

/// Set `head.checksumAdjustment` so the whole file sums to `0xB1B0AFBA`.
fn adjust_checksum(bytes: &mut [u8]) -> Result<(), Error> {
    let head_offset = FontRef::new(bytes)?
        .table_directory
        .table_records()
        .iter()
        .find(|record| record.tag() == Head::TAG)
        .map(|record| record.offset() as usize)
        .ok_or(Error::MissingTable(Head::TAG))?;
    let adjustment = head_offset + 8..head_offset + 12;
    bytes[adjustment.clone()].fill(0);
    let checksum = compute_checksum(bytes);
    bytes[adjustment].copy_from_slice(&0xB1B0_AFBAu32.wrapping_sub(checksum).to_be_bytes());
    Ok(())
}

fn timestamp_since_mac_epoch(datetime: DateTime<Utc>) -> i64 {
    datetime.timestamp() - MACINTOSH_EPOCH
}

/// The number of seconds since 00:00 1904-01-01 (GMT/UTC).
///
/// If the [SOURCE_DATE_EPOCH](https://reproducible-builds.org/specs/source-date-epoch/)
/// environment variable is set, use that instead of the current time.
fn current_timestamp() -> i64 {
    let mut src_date = None;
    if let Ok(src_date_var) = env::var("SOURCE_DATE_EPOCH") {
        if let Ok(timestamp) = src_date_var.parse::<i64>() {
            src_date = Utc.timestamp_opt(timestamp, 0).single();
        };
        if src_date.is_none() {
            warn!(
                "Invalid SOURCE_DATE_EPOCH value: {:?}. Falling back to Utc::now().",
                src_date_var
            );
        }
    }
    timestamp_since_mac_epoch(src_date.unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use write_fonts::read::{FontRef, TableProvider};

    use super::*;

    #[test]
    fn unedited_font_is_returned_verbatim() {
        let bytes = test_fonts::basic();
        let font = EditableFont::from_bytes(bytes.clone()).unwrap();
        assert!(!font.is_edited());
        assert_eq!(bytes, font.to_bytes().unwrap());
    }

    #[test]
    fn loads_truetype_glyphs() {
        let font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        assert_eq!(Outlines::TrueType, font.outlines());
        assert_eq!(test_fonts::NUM_GLYPHS, font.glyph_count());
        assert_eq!(font.glyph_count() as usize, font.glyphs.len());
        assert_eq!(font.glyph_count() as usize, font.metrics.len());
        assert_eq!(1000, font.units_per_em());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            EditableFont::from_bytes(b"definitely not a font".to_vec()),
            Err(Error::FontRead(_))
        ));
    }

    #[test]
    fn compile_hmtx_folds_trailing_run() {
        let metrics = [(500, 10), (600, 20), (600, 30), (600, 40)]
            .into_iter()
            .map(|(advance, side_bearing)| LongMetric {
                advance,
                side_bearing,
            })
            .collect::<Vec<_>>();
        let (hmtx, number_of_h_metrics) = compile_hmtx(&metrics);
        assert_eq!(2, number_of_h_metrics);
        assert_eq!(vec![30, 40], hmtx.left_side_bearings);
    }

    #[test]
    fn saved_edits_are_readable() {
        let mut font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        font.set_familyname("Renamed").unwrap();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.ttf");
        temp_env::with_var("SOURCE_DATE_EPOCH", Some("0"), || font.save(&path).unwrap());

        let bytes = std::fs::read(&path).unwrap();
        let saved = FontRef::new(&bytes).unwrap();
        assert_eq!(
            timestamp_since_mac_epoch(Utc.timestamp_opt(0, 0).unwrap()),
            saved.head().unwrap().modified().as_secs()
        );
        assert_eq!(compute_checksum(&bytes), 0xB1B0AFBA);
        let reloaded = EditableFont::from_bytes(bytes).unwrap();
        assert_eq!(Some("Renamed".to_string()), reloaded.familyname());
    }

    #[test]
    fn otf_requires_cff() {
        let font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        let temp_dir = tempdir().unwrap();
        assert!(matches!(
            font.generate(OutputFormat::Otf, temp_dir.path().join("x.otf")),
            Err(Error::UnsupportedConversion { format: "otf" })
        ));
    }

    #[test]
    fn checksum_survives_a_version_change() {
        let mut font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        font.set_fullname("Checksum Test").unwrap();
        let mut bytes = font.to_bytes().unwrap();
        bytes[..4].copy_from_slice(&OTTO);
        adjust_checksum(&mut bytes).unwrap();
        assert_eq!(compute_checksum(&bytes), 0xB1B0AFBA);
        assert_eq!(
            Some("Checksum Test".to_string()),
            EditableFont::from_bytes(bytes).unwrap().fullname()
        );
    }

    #[test]
    fn source_date_epoch_is_respected() {
        temp_env::with_var("SOURCE_DATE_EPOCH", Some("1"), || {
            assert_eq!(-MACINTOSH_EPOCH + 1, current_timestamp());
        });
    }
}
