//! One font's working copy, original and derived exports.

use std::{
    ffi::OsStr,
    fmt,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, OnceLock},
};

use fontedit::EditableFont;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::{
    cache::{DerivedFormat, DerivedFormatCache},
    error::Error,
    id::FontId,
    lease::Lease,
    metrics::{MetricsNormalizer, MetricsStrategy},
    names::{FontNames, NameRepairer},
    subset::SubsetSelector,
    tools::{HintMethod, ToolKind, Toolbox},
};

// how much of the svg export is searched for font-face attributes
const SVG_PROBE_LEN: u64 = 1024;

/// Formats a font can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Ttf,
    Otf,
    Woff,
    Woff2,
    Eot,
    Svg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Ttf => "ttf",
            ExportFormat::Otf => "otf",
            ExportFormat::Woff => "woff",
            ExportFormat::Woff2 => "woff2",
            ExportFormat::Eot => "eot",
            ExportFormat::Svg => "svg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ttf" => Ok(ExportFormat::Ttf),
            "otf" => Ok(ExportFormat::Otf),
            "woff" => Ok(ExportFormat::Woff),
            "woff2" => Ok(ExportFormat::Woff2),
            "eot" => Ok(ExportFormat::Eot),
            "svg" => Ok(ExportFormat::Svg),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The `@font-face` descriptors of a font, as its svg export reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontProperties {
    pub style: String,
    pub stretch: String,
    pub weight: String,
    pub range: String,
}

impl FontProperties {
    fn from_svg_head(head: &str) -> Self {
        static ATTRS: OnceLock<[Regex; 4]> = OnceLock::new();
        let [style, stretch, weight, range] = ATTRS.get_or_init(|| {
            ["font-style", "font-stretch", "font-weight", "unicode-range"]
                .map(|attr| Regex::new(&format!(r#"{attr}="([^"]+)""#)).unwrap())
        });
        let find = |re: &Regex, default: &str| {
            re.captures(head)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| default.to_string())
        };
        FontProperties {
            style: find(style, "normal"),
            stretch: find(stretch, "normal"),
            weight: find(weight, "normal"),
            range: find(range, "U+0-10FFFF"),
        }
    }
}

fn open_font<'a>(
    slot: &'a mut Option<EditableFont>,
    working: &Path,
) -> Result<&'a mut EditableFont, Error> {
    let font = match slot.take() {
        Some(font) => font,
        None => {
            let font = EditableFont::load(working).map_err(Error::FontOpen)?;
            debug!("Opened {working:?}");
            font
        }
    };
    Ok(slot.insert(font))
}

fn remove_file(path: &Path, strict: bool) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) if strict => Err(Error::file_io(path, e)),
        Err(e) => {
            warn!("Unable to remove {path:?}: {e}");
            Ok(())
        }
    }
}

/// A font being prepared.
///
/// The working file always holds the latest edit; the original is never
/// written. Each entity holds its id's [`Lease`] until it is closed or
/// dropped, so at most one entity per id exists at a time.
pub struct FontEntity {
    id: FontId,
    working: PathBuf,
    original: PathBuf,
    tools: Arc<Toolbox>,
    font: Option<EditableFont>,
    cache: DerivedFormatCache,
    properties: Option<FontProperties>,
    released: bool,
    lease: Lease,
}

impl fmt::Debug for FontEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontEntity")
            .field("id", &self.id)
            .field("working", &self.working)
            .field("font_open", &self.font.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

impl FontEntity {
    /// Takes over a freshly restored working copy.
    pub(crate) fn new(
        id: FontId,
        working: PathBuf,
        original: PathBuf,
        tools: Arc<Toolbox>,
        lease: Lease,
    ) -> Self {
        FontEntity {
            id,
            cache: DerivedFormatCache::new(&working),
            working,
            original,
            tools,
            font: None,
            properties: None,
            released: false,
            lease,
        }
    }

    pub fn id(&self) -> &FontId {
        &self.id
    }

    pub fn working_path(&self) -> &Path {
        &self.working
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// The open font, loaded from the working file on first use.
    pub fn font(&mut self) -> Result<&EditableFont, Error> {
        Ok(self.font_mut()?)
    }

    /// Edits through this must be followed by [commit](Self::commit).
    pub(crate) fn font_mut(&mut self) -> Result<&mut EditableFont, Error> {
        open_font(&mut self.font, &self.working)
    }

    fn close_font(&mut self) {
        if self.font.take().is_some() {
            debug!("Closed {:?}", self.working);
        }
    }

    /// How many derived files have been generated for this entity.
    pub fn generation_count(&self) -> u64 {
        self.cache.generation_count()
    }

    fn invalidate(&mut self, strict: bool) -> Result<(), Error> {
        self.properties = None;
        self.cache.invalidate(strict)
    }

    /// The cached export for `format`, generated from the open font if needed.
    fn derived(&mut self, format: DerivedFormat) -> Result<PathBuf, Error> {
        let FontEntity {
            font,
            working,
            cache,
            ..
        } = self;
        cache.get_or_generate(format, |path| {
            let font = open_font(font, working)?;
            match format.output_format() {
                Some(output) => font.generate(output, path)?,
                None => font.save(path)?,
            }
            Ok(())
        })
    }

    /// Write the open font's edits to the working file and drop stale exports.
    fn commit(&mut self) -> Result<(), Error> {
        if let Some(font) = &self.font {
            if font.is_edited() {
                font.save(&self.working)?;
            }
        }
        self.invalidate(true)
    }

    /// Run `tool` on a derived form, writing its result over the working file.
    ///
    /// The open font is dropped first; the next access loads the tool's output.
    fn rewrite_with(
        &mut self,
        tool: ToolKind,
        input: DerivedFormat,
        flags: &[&str],
    ) -> Result<(), Error> {
        let input = self.derived(input)?;
        self.close_font();
        let args = flags
            .iter()
            .map(OsStr::new)
            .chain([input.as_os_str(), self.working.as_os_str()]);
        self.tools.run(tool, args)?;
        self.invalidate(true)
    }

    /// Keep only the glyphs for `ranges` and what they reference.
    pub fn subset<S: AsRef<str>>(&mut self, ranges: &[S]) -> Result<(), Error> {
        let selector = SubsetSelector::new(ranges)?;
        let removed = selector.apply(self.font_mut()?)?;
        info!("Subset {} removed {removed} glyphs", self.id);
        self.commit()
    }

    /// Have the lookup repair tool rewrite the font's layout tables.
    pub fn fix_lookups(&mut self) -> Result<(), Error> {
        self.rewrite_with(ToolKind::LookupRepair, DerivedFormat::Native, &[])
    }

    pub fn fix_name(&mut self) -> Result<FontNames, Error> {
        let names = NameRepairer::repair(self.font_mut()?)?;
        info!("Renamed {} to '{}'", self.id, names.fullname);
        self.commit()?;
        Ok(names)
    }

    /// Normalize outlines: direction, extrema and integer coordinates.
    pub fn fix_glyphs(&mut self) -> Result<(), Error> {
        let font = self.font_mut()?;
        let reversed = font.correct_direction()?;
        warn!("Overlap removal is not supported, skipped");
        let split = font.add_extrema()?;
        let rounded = font.round_to_int()?;
        debug!(
            "Fixed glyphs of {}: {reversed} reversed, {split} split at extrema, {rounded} rounded",
            self.id
        );
        self.commit()
    }

    /// Decompose composites with transforms rasterizers handle badly.
    pub fn fix_references(&mut self) -> Result<(), Error> {
        let decomposed = self.font_mut()?.correct_references()?;
        debug!("Decomposed {decomposed} composites of {}", self.id);
        self.commit()
    }

    pub fn fix_metrics(&mut self, strategy: MetricsStrategy) -> Result<(), Error> {
        MetricsNormalizer::normalize(self.font_mut()?, strategy)?;
        self.commit()
    }

    /// Autohint the font with `method`.
    pub fn hint(&mut self, method: HintMethod) -> Result<(), Error> {
        let flags = method.flags(self.font()?.has_lowercase_o());
        self.rewrite_with(ToolKind::Autohint, DerivedFormat::Ttf, &flags)
    }

    /// Write the font as it is now in `format` to `out`.
    pub fn export(&mut self, format: ExportFormat, out: &Path) -> Result<(), Error> {
        match format {
            ExportFormat::Ttf | ExportFormat::Otf | ExportFormat::Woff => {
                let derived = self.derived(match format {
                    ExportFormat::Ttf => DerivedFormat::Ttf,
                    ExportFormat::Otf => DerivedFormat::Otf,
                    _ => DerivedFormat::Woff,
                })?;
                fs::copy(&derived, out).map_err(|e| Error::file_io(out, e))?;
            }
            ExportFormat::Woff2 => {
                let ttf = self.derived(DerivedFormat::Ttf)?;
                self.tools.run(ToolKind::Woff2, [&ttf])?;
                // the compressor writes beside its input
                let woff2 = ttf.with_extension("woff2");
                if fs::rename(&woff2, out).is_err() {
                    fs::copy(&woff2, out).map_err(|e| Error::file_io(out, e))?;
                    remove_file(&woff2, false)?;
                }
            }
            ExportFormat::Eot => {
                let ttf = self.derived(DerivedFormat::Ttf)?;
                self.tools.run(ToolKind::Eot, [ttf.as_path(), out])?;
            }
            ExportFormat::Svg => {
                let svg = self.derived(DerivedFormat::Svg)?;
                let args = [
                    Path::new("-i"),
                    svg.as_path(),
                    Path::new("-o"),
                    out,
                ];
                self.tools.run(ToolKind::SvgCleanup, args)?;
            }
        }
        debug!("Exported {} as {format} to {out:?}", self.id);
        Ok(())
    }

    /// Style, stretch, weight and unicode range of the font as it is now.
    pub fn properties(&mut self) -> Result<FontProperties, Error> {
        if let Some(properties) = &self.properties {
            return Ok(properties.clone());
        }
        let svg = self.derived(DerivedFormat::Svg)?;
        let mut head = Vec::new();
        File::open(&svg)
            .and_then(|file| file.take(SVG_PROBE_LEN).read_to_end(&mut head))
            .map_err(|e| Error::file_io(&svg, e))?;
        let properties = FontProperties::from_svg_head(&String::from_utf8_lossy(&head));
        self.properties = Some(properties.clone());
        Ok(properties)
    }

    /// The names of the font as uploaded.
    pub fn original_names(&self) -> Result<FontNames, Error> {
        let font = EditableFont::load(&self.original).map_err(Error::FontOpen)?;
        Ok(FontNames {
            fontname: font.fontname().unwrap_or_default(),
            fullname: font.fullname().unwrap_or_default(),
            familyname: font.familyname().unwrap_or_default(),
        })
    }

    /// The full name of the font as it is now.
    pub fn fullname(&mut self) -> Result<Option<String>, Error> {
        Ok(self.font()?.fullname())
    }

    /// The PostScript name of the font as it is now.
    pub fn fontname(&mut self) -> Result<Option<String>, Error> {
        Ok(self.font()?.fontname())
    }

    fn release(&mut self, strict: bool) -> Result<(), Error> {
        if self.released {
            return Ok(());
        }
        self.close_font();
        self.invalidate(strict)?;
        remove_file(&self.working, strict)?;
        self.released = true;
        info!("Closed {}", self.id);
        Ok(())
    }

    /// Drop the open font, derived files and working copy. The original stays
    /// so the id can be opened again.
    ///
    /// If not `strict`, failures are logged and every step is still attempted.
    pub fn close(mut self, strict: bool) -> Result<(), Error> {
        self.release(strict)
    }

    /// [Close](Self::close) and delete the original. The id is gone for good.
    pub fn destroy(mut self, strict: bool) -> Result<(), Error> {
        self.release(strict)?;
        remove_file(&self.original, strict)?;
        if let Err(e) = self.lease.remove() {
            if strict {
                return Err(e);
            }
            warn!("{e}");
        }
        info!("Destroyed {}", self.id);
        Ok(())
    }
}

impl Drop for FontEntity {
    fn drop(&mut self) {
        if let Err(e) = self.release(false) {
            warn!("Unable to close {}: {e}", self.id);
        }
    }
}
