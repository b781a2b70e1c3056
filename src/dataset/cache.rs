use super::loader::TableLoader;
use super::table::Table;
use crate::error::{Result, TabulaError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

/// What a cached table was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl SourceIdentity {
    /// Stats `path`; failure means the source is unreadable.
    pub fn of(path: &Path) -> Result<Self> {
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| TabulaError::UnreadableSource(format!("{}: {e}", path.display())))?;
        Ok(Self {
            path: path.to_path_buf(),
            modified,
        })
    }
}

#[derive(Debug)]
struct CacheEntry {
    identity: SourceIdentity,
    table: Arc<Table>,
}

/// Single-entry cache for the configured dataset file, keyed by path and
/// modification time.
///
/// Readers share the cached `Arc<Table>`; a reload swaps the entry atomically,
/// so a request sees either the old table or the new one, never a mix.
#[derive(Debug, Default)]
pub struct SourceCache {
    entry: RwLock<Option<CacheEntry>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table for `path`, reloading when its mtime has changed.
    pub fn get_or_load(&self, path: &Path, loader: &TableLoader) -> Result<Arc<Table>> {
        let identity = SourceIdentity::of(path)?;

        if let Some(table) = self.lookup(&identity) {
            return Ok(table);
        }

        // Parse outside the lock; concurrent misses may load twice, last write wins
        tracing::info!("Loading dataset from {}", path.display());
        let table = Arc::new(loader.load_path(path)?);

        let mut guard = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CacheEntry {
            identity,
            table: Arc::clone(&table),
        });
        Ok(table)
    }

    fn lookup(&self, identity: &SourceIdentity) -> Option<Arc<Table>> {
        let guard = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|entry| entry.identity == *identity)
            .map(|entry| Arc::clone(&entry.table))
    }

    /// Identity of the cached entry, if any.
    pub fn identity(&self) -> Option<SourceIdentity> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|entry| entry.identity.clone())
    }

    pub fn clear(&self) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
