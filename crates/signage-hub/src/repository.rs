//! Content repository collaborator.
//!
//! The hub never owns library data. It asks a [`ContentRepository`] for items
//! and display defaults each time it resolves content, so edits and deletions
//! made elsewhere take effect on the next `Change` or `Clear`.

use serde::Deserialize;
use signage_core::{DisplayDefaults, LibraryItem};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Read-only access to library items and global display settings.
pub trait ContentRepository: Send + Sync {
    fn library_item(&self, id: i64) -> Result<Option<LibraryItem>, RepositoryError>;

    fn display_defaults(&self) -> Result<DisplayDefaults, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// On-disk shape: `{"settings": {...}, "library": [...]}`.
#[derive(Deserialize)]
struct RepositoryFile {
    #[serde(default)]
    settings: DisplayDefaults,
    #[serde(default)]
    library: Vec<LibraryItem>,
}

#[derive(Default)]
struct Contents {
    items: HashMap<i64, LibraryItem>,
    defaults: DisplayDefaults,
}

/// In-memory repository, optionally seeded from a JSON file.
#[derive(Default)]
pub struct MemoryRepository {
    contents: RwLock<Contents>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| RepositoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: RepositoryFile =
            serde_json::from_str(&data).map_err(|source| RepositoryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let repo = Self::new();
        repo.set_defaults(file.settings);
        for item in file.library {
            repo.insert(item);
        }
        tracing::info!("Loaded {} library items from {}", repo.len(), path.display());
        Ok(repo)
    }

    pub fn insert(&self, item: LibraryItem) {
        self.write().items.insert(item.guid, item);
    }

    pub fn remove(&self, id: i64) -> Option<LibraryItem> {
        self.write().items.remove(&id)
    }

    pub fn set_defaults(&self, defaults: DisplayDefaults) {
        self.write().defaults = defaults;
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A writer can only panic between plain field assignments, so a poisoned
    // lock still guards consistent data.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Contents> {
        self.contents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Contents> {
        self.contents.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContentRepository for MemoryRepository {
    fn library_item(&self, id: i64) -> Result<Option<LibraryItem>, RepositoryError> {
        Ok(self.read().items.get(&id).cloned())
    }

    fn display_defaults(&self) -> Result<DisplayDefaults, RepositoryError> {
        Ok(self.read().defaults.clone())
    }
}
