//! Upload override storage.
//!
//! An uploaded table is kept as an Arrow IPC snapshot and rebuilt on every
//! read. A snapshot that no longer deserializes clears the slot, which makes
//! the provider fall back to the configured path.

use super::table::Table;
use crate::error::{Result, ResultExt as _};
use polars::prelude::*;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Serialized form of a [`Table`]. Clones share the bytes.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<[u8]>);

impl Snapshot {
    pub fn from_table(table: &Table) -> Result<Self> {
        let mut frame = table.frame().clone();
        let mut buf = Vec::new();
        IpcWriter::new(&mut buf)
            .finish(&mut frame)
            .context("Failed to snapshot upload")?;
        Ok(Self(buf.into()))
    }

    /// Wraps raw snapshot bytes as-is.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn restore(&self) -> Result<Table> {
        let frame = IpcReader::new(Cursor::new(&*self.0)).finish()?;
        Ok(Table::new(frame))
    }
}

#[derive(Debug, Clone)]
struct OverrideEntry {
    snapshot: Snapshot,
    name: String,
    upload_id: Uuid,
}

#[derive(Debug, Default)]
struct SlotState {
    entry: Option<OverrideEntry>,
    /// Survives a discarded snapshot
    last_name: Option<String>,
}

/// Metadata of the active upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub name: String,
    pub upload_id: Uuid,
}

/// Holds at most one uploaded table.
#[derive(Debug, Default)]
pub struct OverrideSlot {
    state: Mutex<SlotState>,
}

impl OverrideSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces any previous override and returns the new upload id.
    pub fn set(&self, snapshot: Snapshot, name: impl Into<String>) -> Uuid {
        let upload_id = Uuid::new_v4();
        let name = name.into();
        tracing::info!(
            "Override set to '{name}' ({} snapshot bytes, id {upload_id})",
            snapshot.len()
        );
        let mut state = self.lock();
        state.last_name = Some(name.clone());
        state.entry = Some(OverrideEntry {
            snapshot,
            name,
            upload_id,
        });
        upload_id
    }

    /// Deserializes the override; a corrupt snapshot is dropped and `None`
    /// is returned.
    ///
    /// The lock is only held to copy the entry out, so concurrent readers
    /// decode in parallel.
    pub fn get(&self) -> Option<Table> {
        let entry = self.lock().entry.clone()?;
        match entry.snapshot.restore() {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!("Discarding unreadable upload '{}': {e}", entry.name);
                let mut state = self.lock();
                // A newer upload may have landed while decoding
                if state
                    .entry
                    .as_ref()
                    .is_some_and(|current| current.upload_id == entry.upload_id)
                {
                    state.entry = None;
                }
                None
            }
        }
    }

    /// Name and id of the stored override, without deserializing it.
    pub fn info(&self) -> Option<UploadInfo> {
        self.lock().entry.as_ref().map(|entry| UploadInfo {
            name: entry.name.clone(),
            upload_id: entry.upload_id,
        })
    }

    /// Name of the most recent upload, even if its snapshot was discarded.
    pub fn get_name(&self) -> Option<String> {
        self.lock().last_name.clone()
    }

    pub fn is_active(&self) -> bool {
        self.lock().entry.is_some()
    }
}
