use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{id::FontId, tools::ToolKind};

/// The coarse classification callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    FontOpen,
    NotFound,
    Upload,
    ToolFailure,
    Io,
    Engine,
}

impl ErrorKind {
    /// The HTTP style status code reported for this kind of failure.
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::FontOpen => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Upload => 413,
            ErrorKind::ToolFailure | ErrorKind::Io | ErrorKind::Engine => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing {0}")]
    MissingInput(&'static str),
    #[error("unknown vertical metrics fixing strategy '{0}'")]
    UnknownStrategy(String),
    #[error("unknown hinting method '{0}'")]
    UnknownHintMethod(String),
    #[error("unknown fix '{0}'")]
    UnknownFix(String),
    #[error("unknown output format '{0}'")]
    UnknownFormat(String),
    #[error("malformed unicode range '{0}'")]
    InvalidRange(String),
    #[error("malformed font id '{0}'")]
    InvalidId(String),
    #[error("unable to fix font names")]
    NameRepair,
    #[error("windows ascent and descent sum to zero, can't apply the webfont strategy")]
    DegenerateMetrics,
    #[error("invalid configuration in '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unable to open font")]
    FontOpen(#[source] fontedit::Error),
    #[error("font original does not exist")]
    NotFound(FontId),
    #[error("unable to write font")]
    Upload(#[source] io::Error),
    #[error("{tool} exited with status {status:?}")]
    ToolFailed { tool: ToolKind, status: Option<i32> },
    #[error("{tool} timed out")]
    ToolTimedOut { tool: ToolKind },
    #[error("unable to run {tool}: {source}")]
    ToolSpawn {
        tool: ToolKind,
        #[source]
        source: io::Error,
    },
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Engine(#[from] fontedit::Error),
}

impl Error {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingInput(..)
            | Error::UnknownStrategy(..)
            | Error::UnknownHintMethod(..)
            | Error::UnknownFix(..)
            | Error::UnknownFormat(..)
            | Error::InvalidRange(..)
            | Error::InvalidId(..)
            | Error::NameRepair
            | Error::DegenerateMetrics
            | Error::Config { .. } => ErrorKind::Validation,
            Error::FontOpen(..) => ErrorKind::FontOpen,
            Error::NotFound(..) => ErrorKind::NotFound,
            Error::Upload(..) => ErrorKind::Upload,
            Error::ToolFailed { .. } | Error::ToolTimedOut { .. } | Error::ToolSpawn { .. } => {
                ErrorKind::ToolFailure
            }
            Error::FileIo { .. } => ErrorKind::Io,
            Error::Engine(..) => ErrorKind::Engine,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().code()
    }
}
