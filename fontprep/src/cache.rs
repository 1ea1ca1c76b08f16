//! Lazily generated exports of the current working file.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use fontedit::OutputFormat;
use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::Error;

/// The representations an entity derives from its working file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedFormat {
    /// The engine's own lossless save, the lookup repair tool's input
    Native,
    Ttf,
    Otf,
    Woff,
    /// An svg font, also probed for [`FontProperties`](crate::FontProperties)
    Svg,
}

impl DerivedFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DerivedFormat::Native => "sfnt",
            DerivedFormat::Ttf => "ttf",
            DerivedFormat::Otf => "otf",
            DerivedFormat::Woff => "woff",
            DerivedFormat::Svg => "svg",
        }
    }

    /// The engine generator for this format, None for the native save.
    pub(crate) fn output_format(&self) -> Option<OutputFormat> {
        match self {
            DerivedFormat::Native => None,
            DerivedFormat::Ttf => Some(OutputFormat::Ttf),
            DerivedFormat::Otf => Some(OutputFormat::Otf),
            DerivedFormat::Woff => Some(OutputFormat::Woff),
            DerivedFormat::Svg => Some(OutputFormat::Svg),
        }
    }
}

impl fmt::Display for DerivedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// At most one file per format, each an export of the working file as it is
/// now.
///
/// Owners must [invalidate](Self::invalidate) after every change to the
/// working file.
#[derive(Debug)]
pub(crate) struct DerivedFormatCache {
    base: PathBuf,
    entries: IndexMap<DerivedFormat, PathBuf>,
    generations: u64,
}

impl DerivedFormatCache {
    /// Cache exports of the file at `base`, each written to `<base>.<ext>`.
    pub(crate) fn new(base: impl Into<PathBuf>) -> Self {
        DerivedFormatCache {
            base: base.into(),
            entries: Default::default(),
            generations: 0,
        }
    }

    fn path_for(&self, format: DerivedFormat) -> PathBuf {
        let mut path = self.base.clone().into_os_string();
        path.push(".");
        path.push(format.extension());
        path.into()
    }

    /// The cached export for `format`, running `generate` if there isn't one.
    pub(crate) fn get_or_generate(
        &mut self,
        format: DerivedFormat,
        generate: impl FnOnce(&Path) -> Result<(), Error>,
    ) -> Result<PathBuf, Error> {
        if let Some(path) = self.entries.get(&format) {
            return Ok(path.clone());
        }
        let path = self.path_for(format);
        generate(&path)?;
        self.generations += 1;
        debug!("Generated {format} at {path:?}");
        self.entries.insert(format, path.clone());
        Ok(path)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, format: DerivedFormat) -> bool {
        self.entries.contains_key(&format)
    }

    /// How many exports have been generated over this cache's lifetime.
    pub(crate) fn generation_count(&self) -> u64 {
        self.generations
    }

    /// Delete every cached file.
    ///
    /// If `strict` the first failure stops the sweep and is returned, leaving
    /// that entry and any not yet visited in place. Otherwise failures are
    /// logged and every entry is dropped. A file that is already gone counts
    /// as deleted.
    pub(crate) fn invalidate(&mut self, strict: bool) -> Result<(), Error> {
        while let Some((format, path)) = self.entries.pop() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Invalidated {format} at {path:?}"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => (),
                Err(e) if strict => {
                    let err = Error::file_io(&path, e);
                    self.entries.insert(format, path);
                    return Err(err);
                }
                Err(e) => warn!("Unable to remove {format} at {path:?}: {e}"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn touch(path: &Path) -> Result<(), Error> {
        fs::write(path, b"derived").map_err(|e| Error::file_io(path, e))
    }

    #[test]
    fn generates_once_per_format() {
        let temp_dir = tempdir().unwrap();
        let mut cache = DerivedFormatCache::new(temp_dir.path().join("font_a"));

        let first = cache.get_or_generate(DerivedFormat::Ttf, touch).unwrap();
        let again = cache
            .get_or_generate(DerivedFormat::Ttf, |_| panic!("should be cached"))
            .unwrap();
        let svg = cache.get_or_generate(DerivedFormat::Svg, touch).unwrap();

        assert_eq!(temp_dir.path().join("font_a.ttf"), first);
        assert_eq!(first, again);
        assert_eq!(temp_dir.path().join("font_a.svg"), svg);
        assert_eq!(2, cache.generation_count());
    }

    #[test]
    fn failed_generation_is_not_cached() {
        let temp_dir = tempdir().unwrap();
        let mut cache = DerivedFormatCache::new(temp_dir.path().join("font_b"));
        let result = cache.get_or_generate(DerivedFormat::Woff, |_| {
            Err(Error::MissingInput("font"))
        });
        assert!(result.is_err());
        assert!(!cache.contains(DerivedFormat::Woff));
        assert_eq!(0, cache.generation_count());
    }

    #[test]
    fn invalidate_removes_files() {
        let temp_dir = tempdir().unwrap();
        let mut cache = DerivedFormatCache::new(temp_dir.path().join("font_c"));
        let ttf = cache.get_or_generate(DerivedFormat::Ttf, touch).unwrap();
        let native = cache.get_or_generate(DerivedFormat::Native, touch).unwrap();
        assert!(ttf.exists() && native.exists());

        cache.invalidate(true).unwrap();

        assert!(!ttf.exists());
        assert!(!native.exists());
        assert!(!cache.contains(DerivedFormat::Ttf));
        cache.get_or_generate(DerivedFormat::Ttf, touch).unwrap();
        assert_eq!(3, cache.generation_count());
    }

    #[test]
    fn files_already_gone_are_fine() {
        let temp_dir = tempdir().unwrap();
        let mut cache = DerivedFormatCache::new(temp_dir.path().join("font_d"));
        // generator that claims success without writing anything
        cache.get_or_generate(DerivedFormat::Otf, |_| Ok(())).unwrap();
        cache.invalidate(true).unwrap();
        assert!(!cache.contains(DerivedFormat::Otf));
    }

    #[test]
    fn strict_invalidate_reports_failures() {
        let temp_dir = tempdir().unwrap();
        let mut cache = DerivedFormatCache::new(temp_dir.path().join("font_e"));
        // a directory can't be removed with remove_file
        let path = cache
            .get_or_generate(DerivedFormat::Svg, |p| {
                fs::create_dir(p).map_err(|e| Error::file_io(p, e))
            })
            .unwrap();

        assert!(matches!(
            cache.invalidate(true),
            Err(Error::FileIo { .. })
        ));
        assert!(cache.contains(DerivedFormat::Svg));

        cache.invalidate(false).unwrap();
        assert!(!cache.contains(DerivedFormat::Svg));
        assert!(path.exists());
    }
}
