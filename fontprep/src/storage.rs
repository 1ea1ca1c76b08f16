//! Where fonts live on disk.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};

use crate::{
    config::Config, entity::FontEntity, error::Error, id::FontId, lease::Lease, tools::Toolbox,
};

// uploads are streamed to disk in pieces this size
const CHUNK_SIZE: usize = 1024;

/// Creates and reopens [`FontEntity`]s under one directory.
///
/// For id `x` the working copy is `<root>/<prefix>x`, the original
/// `<root>/<prefix>x_original` and the lock `<root>/<prefix>x.lock`.
#[derive(Debug, Clone)]
pub struct FontStore {
    root: PathBuf,
    prefix: String,
    tools: Arc<Toolbox>,
}

impl FontStore {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let root = config.storage.root.clone();
        fs::create_dir_all(&root).map_err(|e| Error::file_io(&root, e))?;
        Ok(FontStore {
            root,
            prefix: config.storage.prefix.clone(),
            tools: Arc::new(Toolbox::new(&config.tools)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn base_name(&self, id: &FontId) -> String {
        format!("{}{id}", self.prefix)
    }

    pub fn working_path(&self, id: &FontId) -> PathBuf {
        self.root.join(self.base_name(id))
    }

    pub fn original_path(&self, id: &FontId) -> PathBuf {
        self.root.join(format!("{}_original", self.base_name(id)))
    }

    fn lock_path(&self, id: &FontId) -> PathBuf {
        self.root.join(format!("{}.lock", self.base_name(id)))
    }

    /// Store an upload under a new id and open it.
    pub fn create(&self, upload: impl Read) -> Result<FontEntity, Error> {
        let id = FontId::generate();
        let lease = Lease::acquire(self.lock_path(&id))?;
        let working = self.working_path(&id);
        let original = self.original_path(&id);

        if let Err(e) = stream_to(upload, &working) {
            discard(&working);
            discard(lease.path());
            return Err(Error::Upload(e));
        }
        if let Err(e) = fs::copy(&working, &original) {
            discard(&working);
            discard(&original);
            discard(lease.path());
            return Err(Error::file_io(&original, e));
        }
        info!("Created {id}");
        Ok(FontEntity::new(
            id,
            working,
            original,
            self.tools.clone(),
            lease,
        ))
    }

    /// Open `id` with a working copy fresh from the original.
    ///
    /// Waits for any other entity holding the id to be closed first.
    pub fn open(&self, id: &FontId) -> Result<FontEntity, Error> {
        let lease = Lease::acquire(self.lock_path(id))?;
        let original = self.original_path(id);
        if !original.exists() {
            if let Err(e) = lease.remove() {
                warn!("{e}");
            }
            return Err(Error::NotFound(id.clone()));
        }
        let working = self.working_path(id);
        if let Err(e) = fs::copy(&original, &working) {
            discard(&working);
            return Err(Error::file_io(&working, e));
        }
        info!("Opened {id}");
        Ok(FontEntity::new(
            id.clone(),
            working,
            original,
            self.tools.clone(),
            lease,
        ))
    }

    /// Delete everything stored for `id`.
    pub fn destroy(&self, id: &FontId) -> Result<(), Error> {
        self.open(id)?.destroy(true)
    }
}

fn stream_to(mut upload: impl Read, path: &Path) -> Result<(), io::Error> {
    let mut out = BufWriter::with_capacity(CHUNK_SIZE, File::create(path)?);
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let len = match upload.read(&mut chunk) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&chunk[..len])?;
    }
    out.flush()
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Unable to remove {path:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::config::StorageConfig;

    fn store(temp_dir: &TempDir) -> FontStore {
        FontStore::new(&Config {
            storage: StorageConfig {
                root: temp_dir.path().join("fonts"),
                prefix: "font_".to_string(),
            },
            ..Default::default()
        })
        .unwrap()
    }

    /// Reads a few bytes then fails, like a dropped connection.
    struct BrokenUpload(usize);

    impl Read for BrokenUpload {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone"));
            }
            let len = buf.len().min(self.0);
            buf[..len].fill(0);
            self.0 -= len;
            Ok(len)
        }
    }

    #[test]
    fn create_writes_working_and_original() {
        let temp_dir = tempdir().unwrap();
        let store = store(&temp_dir);
        let font = test_fonts::basic();

        let entity = store.create(Cursor::new(font.clone())).unwrap();
        let id = entity.id().clone();

        assert_eq!(store.working_path(&id), entity.working_path());
        assert_eq!(
            temp_dir
                .path()
                .join("fonts")
                .join(format!("font_{id}_original")),
            entity.original_path()
        );
        assert_eq!(font, fs::read(entity.working_path()).unwrap());
        assert_eq!(font, fs::read(entity.original_path()).unwrap());
    }

    #[test]
    fn round_trip() {
        let temp_dir = tempdir().unwrap();
        let store = store(&temp_dir);
        let font = test_fonts::basic();
        let id = {
            let entity = store.create(Cursor::new(font.clone())).unwrap();
            let id = entity.id().clone();
            entity.close(true).unwrap();
            id
        };
        assert!(!store.working_path(&id).exists());

        let entity = store.open(&id).unwrap();
        assert_eq!(
            fs::read(entity.original_path()).unwrap(),
            fs::read(entity.working_path()).unwrap()
        );
        assert_eq!(font, fs::read(entity.working_path()).unwrap());
    }

    #[test]
    fn failed_upload_leaves_nothing_behind() {
        let temp_dir = tempdir().unwrap();
        let store = store(&temp_dir);
        let err = store.create(BrokenUpload(5000)).unwrap_err();
        assert!(matches!(err, Error::Upload(_)));
        assert_eq!(413, err.code());
        assert_eq!(0, fs::read_dir(store.root()).unwrap().count());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let temp_dir = tempdir().unwrap();
        let store = store(&temp_dir);
        let id = FontId::generate();
        let err = store.open(&id).unwrap_err();
        assert!(matches!(&err, Error::NotFound(missing) if *missing == id));
        assert_eq!(404, err.code());
        assert!(!store.lock_path(&id).exists());
    }

    #[test]
    fn failed_restore_leaves_no_working_copy() {
        let temp_dir = tempdir().unwrap();
        let store = store(&temp_dir);
        let id = {
            let entity = store.create(Cursor::new(test_fonts::basic())).unwrap();
            let id = entity.id().clone();
            entity.close(true).unwrap();
            id
        };
        let original = store.original_path(&id);
        fs::remove_file(&original).unwrap();
        fs::create_dir(&original).unwrap();

        let err = store.open(&id).unwrap_err();
        assert!(matches!(&err, Error::FileIo { path, .. } if *path == store.working_path(&id)));
        assert!(!store.working_path(&id).exists());

        // the id isn't left locked
        fs::remove_dir(&original).unwrap();
        fs::write(&original, test_fonts::basic()).unwrap();
        store.open(&id).unwrap().close(true).unwrap();
    }

    #[test]
    fn destroy_is_terminal() {
        let temp_dir = tempdir().unwrap();
        let store = store(&temp_dir);
        let id = {
            let entity = store.create(Cursor::new(test_fonts::basic())).unwrap();
            entity.id().clone()
        };
        store.destroy(&id).unwrap();

        assert!(matches!(store.open(&id), Err(Error::NotFound(_))));
        assert!(matches!(store.destroy(&id), Err(Error::NotFound(_))));
        assert_eq!(0, fs::read_dir(store.root()).unwrap().count());
    }
}
