//! Whole requests: upload, process and delete.

use std::{
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    entity::{ExportFormat, FontEntity, FontProperties},
    error::Error,
    id::FontId,
    metrics::MetricsStrategy,
    storage::FontStore,
    tools::HintMethod,
};

/// One repair step of a [`ProcessRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    Names,
    Metrics(MetricsStrategy),
    Glyphs,
    References,
    Lookups,
}

impl FromStr for Fix {
    type Err = Error;

    /// `names`, `glyphs`, `references`, `lookups` or `metrics[:strategy]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        match (name, arg) {
            ("names", None) => Ok(Fix::Names),
            ("metrics", None) => Ok(Fix::Metrics(Default::default())),
            ("metrics", Some(strategy)) => Ok(Fix::Metrics(strategy.parse()?)),
            ("glyphs", None) => Ok(Fix::Glyphs),
            ("references", None) => Ok(Fix::References),
            ("lookups", None) => Ok(Fix::Lookups),
            _ => Err(Error::UnknownFix(s.to_string())),
        }
    }
}

impl FontEntity {
    pub fn apply(&mut self, fix: Fix) -> Result<(), Error> {
        debug!("Applying {fix:?} to {}", self.id());
        match fix {
            Fix::Names => self.fix_name().map(|_| ()),
            Fix::Metrics(strategy) => self.fix_metrics(strategy),
            Fix::Glyphs => self.fix_glyphs(),
            Fix::References => self.fix_references(),
            Fix::Lookups => self.fix_lookups(),
        }
    }
}

/// What to do to a stored font, applied in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessRequest {
    pub fixes: Vec<Fix>,
    pub hinting: Option<HintMethod>,
    /// Unicode range expressions, empty keeps every glyph
    pub ranges: Vec<String>,
    pub outputs: Vec<ExportFormat>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub id: FontId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Processed {
    pub id: FontId,
    pub files: Vec<PathBuf>,
    pub properties: FontProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub id: FontId,
}

/// What happens to an entity whose pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Close,
    Destroy,
}

/// Run `work` on `entity`, closing it afterwards.
///
/// On failure the entity is torn down without strictness so cleanup problems
/// are only logged and the caller sees `work`'s error.
fn run<T>(
    mut entity: FontEntity,
    on_failure: Teardown,
    work: impl FnOnce(&mut FontEntity) -> Result<T, Error>,
) -> Result<T, Error> {
    match work(&mut entity) {
        Ok(value) => {
            entity.close(true)?;
            Ok(value)
        }
        Err(e) => {
            let id = entity.id().clone();
            let cleanup = match on_failure {
                Teardown::Close => entity.close(false),
                Teardown::Destroy => entity.destroy(false),
            };
            if let Err(cleanup) = cleanup {
                warn!("Cleanup of {id} after '{e}' failed: {cleanup}");
            }
            Err(e)
        }
    }
}

/// Store an upload, returning its new id and full name.
///
/// Uploads the engine can't open are discarded.
pub fn create(store: &FontStore, upload: impl Read) -> Result<Created, Error> {
    let entity = store.create(upload)?;
    run(entity, Teardown::Destroy, |entity| {
        let name = entity.fullname()?.unwrap_or_default();
        Ok(Created {
            id: entity.id().clone(),
            name,
        })
    })
}

// keep names usable as file names
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

fn export_path(out_dir: &Path, stem: &str, format: ExportFormat) -> PathBuf {
    out_dir.join(format!("{stem}.{}", format.extension()))
}

/// Reopen `id` from its original and apply `request`.
///
/// Fixes run first, then hinting, subsetting and finally the exports, each
/// written to `<out_dir>/<fontname>.<ext>`. Every run starts over from the
/// uploaded font.
pub fn process(
    store: &FontStore,
    id: &FontId,
    request: &ProcessRequest,
) -> Result<Processed, Error> {
    if request.outputs.is_empty() {
        return Err(Error::MissingInput("output format"));
    }
    let entity = store.open(id)?;
    run(entity, Teardown::Close, |entity| {
        for fix in request.fixes.iter() {
            entity.apply(*fix)?;
        }
        if let Some(method) = request.hinting {
            entity.hint(method)?;
        }
        if !request.ranges.is_empty() {
            entity.subset(request.ranges.as_slice())?;
        }
        let stem = entity
            .fontname()?
            .filter(|name| !name.trim().is_empty())
            .map(|name| file_stem(&name))
            .unwrap_or_else(|| entity.id().to_string());
        let mut files = Vec::with_capacity(request.outputs.len());
        for format in request.outputs.iter() {
            let path = export_path(&request.out_dir, &stem, *format);
            entity.export(*format, &path)?;
            files.push(path);
        }
        Ok(Processed {
            id: entity.id().clone(),
            files,
            properties: entity.properties()?,
        })
    })
}

/// Remove every trace of `id`.
pub fn delete(store: &FontStore, id: &FontId) -> Result<Deleted, Error> {
    store.destroy(id)?;
    Ok(Deleted { id: id.clone() })
}
