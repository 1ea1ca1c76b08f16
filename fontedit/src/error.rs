use std::{io, path::PathBuf};

use thiserror::Error;
use write_fonts::{
    read::ReadError,
    types::{NameId, Tag},
    BuilderError,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to read font: {0}")]
    FontRead(#[from] ReadError),
    #[error("Font collections are not supported")]
    Collection,
    #[error("IO failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Font has no '{0}' table")]
    MissingTable(Tag),
    #[error("Unable to assemble font")]
    Build(#[from] BuilderError),
    #[error("Generating bytes for '{table}' failed: {source}")]
    Dump {
        table: Tag,
        #[source]
        source: write_fonts::error::Error,
    },
    #[error("Compressing '{table}' failed: {source}")]
    Compress {
        table: Tag,
        #[source]
        source: io::Error,
    },
    #[error("Glyph edits require TrueType outlines")]
    UnsupportedOutlines,
    #[error("Cannot generate {format} from this font")]
    UnsupportedConversion { format: &'static str },
    #[error("Glyph id {0} is out of range")]
    GlyphOutOfRange(u32),
    #[error("Name {name_id} cannot be set to {value:?}")]
    InvalidName { name_id: NameId, value: String },
    #[error("Unable to encode cmap: {0}")]
    Cmap(#[from] write_fonts::tables::cmap::CmapConflict),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
