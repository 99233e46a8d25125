// The shared dataset as a local CSV file.
//
// Writers take a lock file next to the dataset for the duration of one conditional
// write, and replace the dataset with a rename so that readers never see half a file.

use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use survey_form::*;

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(dataset: &Path) -> Result<LockGuard, StoreFailure> {
        let path = with_suffix(dataset, ".lock");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                // The pid helps with finding who left a lock behind.
                if let Err(e) = writeln!(f, "{}", std::process::id()) {
                    warn!("FileStore: could not write to {}: {}", path.display(), e);
                }
                Ok(LockGuard { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    "FileStore: {} is locked by another writer",
                    dataset.display()
                );
                Err(StoreFailure::Stale)
            }
            Err(e) => Err(io_failure(e)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("FileStore: could not remove {}: {}", self.path.display(), e);
        }
    }
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> FileStore {
        FileStore { path: path.into() }
    }

    fn read_current(&self) -> Result<Option<String>, StoreFailure> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_failure(e)),
        }
    }

    fn replace(&self, content: &str) -> Result<(), StoreFailure> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_failure)?;
            }
        }
        let tmp = with_suffix(&self.path, ".tmp");
        fs::write(&tmp, content).map_err(io_failure)?;
        fs::rename(&tmp, &self.path).map_err(io_failure)
    }
}

impl DatasetStore for FileStore {
    fn fetch(&self) -> Result<Fetched, StoreFailure> {
        Ok(match self.read_current()? {
            Some(content) => {
                let version = VersionToken::of_content(&content);
                Fetched::Found { content, version }
            }
            None => Fetched::Missing,
        })
    }

    fn create(&self, content: &str) -> Result<(), StoreFailure> {
        let _lock = LockGuard::acquire(&self.path)?;
        if self.read_current()?.is_some() {
            debug!("FileStore::create: {} already exists", self.path.display());
            return Err(StoreFailure::Stale);
        }
        self.replace(content)
    }

    fn update(&self, content: &str, version: &VersionToken) -> Result<(), StoreFailure> {
        let _lock = LockGuard::acquire(&self.path)?;
        match self.read_current()? {
            None => Err(StoreFailure::Vanished),
            Some(current) if VersionToken::of_content(&current) != *version => {
                debug!("FileStore::update: stale version {}", version);
                Err(StoreFailure::Stale)
            }
            Some(_) => self.replace(content),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn local_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn io_failure(e: io::Error) -> StoreFailure {
    match e.kind() {
        ErrorKind::PermissionDenied => StoreFailure::Rejected(e.to_string()),
        _ => StoreFailure::Unavailable(e.to_string()),
    }
}
