//! Per-id serialization across processes.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::error::Error;

/// An exclusive advisory lock on one font id.
///
/// Held for the whole life of a [`FontEntity`](crate::FontEntity) so a
/// concurrent open, close or destroy of the same id waits its turn.
/// Released when dropped.
#[derive(Debug)]
pub(crate) struct Lease {
    path: PathBuf,
    file: File,
}

impl Lease {
    /// Block until the lock file at `path` can be exclusively locked.
    pub(crate) fn acquire(path: impl Into<PathBuf>) -> Result<Lease, Error> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::file_io(&path, e))?;
        file.lock().map_err(|e| Error::file_io(&path, e))?;
        debug!("Leased {path:?}");
        Ok(Lease { path, file })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file while still holding the lock.
    ///
    /// Anyone already waiting on the old file wins an unlinked lock and must
    /// recheck that the font still exists.
    pub(crate) fn remove(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::file_io(&self.path, e)),
            _ => Ok(()),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Unable to unlock {:?}: {e}", self.path);
        }
    }
}
