// The contract between the appender and the place where the dataset lives.

use log::debug;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Identifies one version of the dataset content.
///
/// Stores compare it before accepting a write: a token that no longer matches the
/// current content means that another writer committed in between.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    /// The sha256 hex digest of the content.
    pub fn of_content(content: &str) -> VersionToken {
        VersionToken(sha256::digest(content))
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The result of reading the dataset.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Fetched {
    Found {
        content: String,
        version: VersionToken,
    },
    /// The store is certain that the dataset does not exist.
    Missing,
}

/// Why a store operation did not go through.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StoreFailure {
    /// The version token is out of date, or the dataset was created by someone else.
    Stale,
    /// The dataset disappeared since it was fetched.
    Vanished,
    /// A failure that may go away by itself (network, timeout, server error).
    Unavailable(String),
    /// A failure that will not go away by retrying (credentials, permissions).
    Rejected(String),
}

impl Display for StoreFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreFailure::Stale => write!(f, "the dataset changed since it was read"),
            StoreFailure::Vanished => write!(f, "the dataset disappeared since it was read"),
            StoreFailure::Unavailable(m) => write!(f, "store unavailable: {}", m),
            StoreFailure::Rejected(m) => write!(f, "store rejected the request: {}", m),
        }
    }
}

/// A place that holds one CSV dataset with versioned, conditional writes.
///
/// Implementations must only return [Fetched::Missing] when the dataset certainly
/// does not exist. Everything uncertain is [StoreFailure::Unavailable].
pub trait DatasetStore {
    fn fetch(&self) -> Result<Fetched, StoreFailure>;

    /// Creates the dataset. Fails with [StoreFailure::Stale] if it already exists.
    fn create(&self, content: &str) -> Result<(), StoreFailure>;

    /// Replaces the dataset, provided that its current version is still `version`.
    fn update(&self, content: &str, version: &VersionToken) -> Result<(), StoreFailure>;

    /// A human-readable location, for logging.
    fn describe(&self) -> String;

    /// The file holding the dataset, for stores backed by a local file.
    fn local_path(&self) -> Option<PathBuf> {
        None
    }
}

impl<S: DatasetStore + ?Sized> DatasetStore for &S {
    fn fetch(&self) -> Result<Fetched, StoreFailure> {
        (**self).fetch()
    }

    fn create(&self, content: &str) -> Result<(), StoreFailure> {
        (**self).create(content)
    }

    fn update(&self, content: &str, version: &VersionToken) -> Result<(), StoreFailure> {
        (**self).update(content, version)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn local_path(&self) -> Option<PathBuf> {
        (**self).local_path()
    }
}

impl<S: DatasetStore + ?Sized> DatasetStore for Box<S> {
    fn fetch(&self) -> Result<Fetched, StoreFailure> {
        (**self).fetch()
    }

    fn create(&self, content: &str) -> Result<(), StoreFailure> {
        (**self).create(content)
    }

    fn update(&self, content: &str, version: &VersionToken) -> Result<(), StoreFailure> {
        (**self).update(content, version)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn local_path(&self) -> Option<PathBuf> {
        (**self).local_path()
    }
}

/// A dataset kept in memory. Clones share the same content, so that several
/// appenders (possibly on several threads) can race against it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    content: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_content(content: &str) -> MemoryStore {
        MemoryStore {
            content: Arc::new(Mutex::new(Some(content.to_string()))),
        }
    }

    /// The current content, if the dataset exists.
    pub fn content(&self) -> Option<String> {
        self.content.lock().ok().and_then(|c| c.clone())
    }

    /// Removes the dataset.
    pub fn delete(&self) {
        if let Ok(mut c) = self.content.lock() {
            *c = None;
        }
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StoreFailure> {
        self.content
            .lock()
            .map_err(|_| StoreFailure::Unavailable("memory store poisoned".to_string()))
    }
}

impl DatasetStore for MemoryStore {
    fn fetch(&self) -> Result<Fetched, StoreFailure> {
        let guard = self.locked()?;
        Ok(match guard.as_ref() {
            Some(content) => Fetched::Found {
                content: content.clone(),
                version: VersionToken::of_content(content),
            },
            None => Fetched::Missing,
        })
    }

    fn create(&self, content: &str) -> Result<(), StoreFailure> {
        let mut guard = self.locked()?;
        if guard.is_some() {
            return Err(StoreFailure::Stale);
        }
        *guard = Some(content.to_string());
        Ok(())
    }

    fn update(&self, content: &str, version: &VersionToken) -> Result<(), StoreFailure> {
        let mut guard = self.locked()?;
        match guard.as_ref() {
            None => Err(StoreFailure::Vanished),
            Some(current) if VersionToken::of_content(current) != *version => {
                debug!("MemoryStore::update: stale version {}", version);
                Err(StoreFailure::Stale)
            }
            Some(_) => {
                *guard = Some(content.to_string());
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_writes() {
        let store = MemoryStore::new();
        assert_eq!(store.fetch(), Ok(Fetched::Missing));
        assert_eq!(
            store.update("a\n", &VersionToken::of_content("")),
            Err(StoreFailure::Vanished)
        );
        store.create("a\n").unwrap();
        assert_eq!(store.create("b\n"), Err(StoreFailure::Stale));

        let version = match store.fetch().unwrap() {
            Fetched::Found { version, .. } => version,
            Fetched::Missing => panic!("created above"),
        };
        store.update("a\n1\n", &version).unwrap();
        assert_eq!(store.update("a\n2\n", &version), Err(StoreFailure::Stale));
        assert_eq!(store.content().as_deref(), Some("a\n1\n"));
    }

    #[test]
    fn clones_share_content() {
        let store = MemoryStore::with_content("a\n");
        let other = store.clone();
        other.delete();
        assert_eq!(store.fetch(), Ok(Fetched::Missing));
    }

    #[test]
    fn tokens_follow_content() {
        assert_eq!(VersionToken::of_content("x"), VersionToken::of_content("x"));
        assert_ne!(VersionToken::of_content("x"), VersionToken::of_content("y"));
    }
}
