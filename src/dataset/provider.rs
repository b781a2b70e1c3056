use super::cache::SourceCache;
use super::loader::TableLoader;
use super::snapshot::{OverrideSlot, Snapshot};
use super::table::Table;
use crate::config::Settings;
use crate::error::{Result, TabulaError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Where the current table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Upload,
    Path,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub source: SourceKind,
    pub name: Option<String>,
    pub path: Option<String>,
    pub upload_id: Option<Uuid>,
}

/// Result of an accepted upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub upload_id: Uuid,
}

/// Decides which table is current: the upload override if one restores,
/// otherwise the configured file through the mtime cache.
#[derive(Debug)]
pub struct DatasetProvider {
    dataset_path: Option<PathBuf>,
    loader: TableLoader,
    cache: SourceCache,
    overrides: OverrideSlot,
}

impl DatasetProvider {
    pub fn new(dataset_path: Option<PathBuf>, loader: TableLoader) -> Self {
        Self {
            dataset_path,
            loader,
            cache: SourceCache::new(),
            overrides: OverrideSlot::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.dataset_path(),
            TableLoader::new(settings.sniff_sample_bytes),
        )
    }

    pub fn dataset_path(&self) -> Option<&Path> {
        self.dataset_path.as_deref()
    }

    pub fn overrides(&self) -> &OverrideSlot {
        &self.overrides
    }

    /// The table profiling requests should read.
    pub fn current(&self) -> Result<Arc<Table>> {
        if let Some(table) = self.overrides.get() {
            return Ok(Arc::new(table));
        }
        match &self.dataset_path {
            Some(path) => self.cache.get_or_load(path, &self.loader),
            None => Err(TabulaError::MissingConfiguration),
        }
    }

    /// Parses an upload and makes it the override.
    ///
    /// Nothing is replaced when the file is rejected or fails to parse.
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadReceipt> {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_owned();
        let table = self.loader.load_bytes(&name, bytes)?;
        let (rows, cols) = (table.height(), table.width());
        let upload_id = self.overrides.set(Snapshot::from_table(&table)?, name.clone());
        tracing::info!("Accepted upload '{name}': {rows} rows x {cols} columns");
        Ok(UploadReceipt {
            name,
            rows,
            cols,
            upload_id,
        })
    }

    pub fn info(&self) -> DatasetInfo {
        let path = self
            .dataset_path
            .as_ref()
            .map(|p| p.display().to_string());
        if let Some(upload) = self.overrides.info() {
            return DatasetInfo {
                source: SourceKind::Upload,
                name: Some(upload.name),
                path,
                upload_id: Some(upload.upload_id),
            };
        }
        match &self.dataset_path {
            Some(p) => DatasetInfo {
                source: SourceKind::Path,
                name: p.file_name().map(|n| n.to_string_lossy().into_owned()),
                path,
                upload_id: None,
            },
            None => DatasetInfo {
                source: SourceKind::None,
                name: self.overrides.get_name(),
                path: None,
                upload_id: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn temp_csv(dir: &TempDir, contents: &str) -> Result<PathBuf> {
        let path = dir.path().join("configured.csv");
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn test_missing_configuration_without_upload() {
        let provider = DatasetProvider::new(None, TableLoader::default());
        assert!(matches!(
            provider.current(),
            Err(TabulaError::MissingConfiguration)
        ));
        assert_eq!(provider.info().source, SourceKind::None);
    }

    #[test]
    fn test_upload_takes_priority_over_path() -> Result<()> {
        let dir = TempDir::new()?;
        let path = temp_csv(&dir, "a,b\n1,2\n")?;
        let provider = DatasetProvider::new(Some(path.clone()), TableLoader::default());
        assert_eq!(provider.current()?.width(), 2);

        let receipt = provider.upload("dir/other.csv", b"x,y,z\n1,2,3\n4,5,6\n")?;
        assert_eq!(receipt.name, "other.csv");
        assert_eq!((receipt.rows, receipt.cols), (2, 3));
        assert_eq!(provider.current()?.width(), 3);

        let info = provider.info();
        assert_eq!(info.source, SourceKind::Upload);
        assert_eq!(info.upload_id, Some(receipt.upload_id));
        Ok(())
    }

    #[test]
    fn test_upload_works_without_configured_path() -> Result<()> {
        let provider = DatasetProvider::new(None, TableLoader::default());
        provider.upload("only.csv", b"a\n1\n2\n")?;
        assert_eq!(provider.current()?.height(), 2);
        Ok(())
    }

    #[test]
    fn test_rejected_upload_keeps_previous_state() -> Result<()> {
        let provider = DatasetProvider::new(None, TableLoader::default());
        provider.upload("first.csv", b"a,b\n1,2\n")?;
        assert!(matches!(
            provider.upload("slides.pptx", b"whatever"),
            Err(TabulaError::UnsupportedFormat(_))
        ));
        assert_eq!(provider.info().name.as_deref(), Some("first.csv"));
        Ok(())
    }

    #[test]
    fn test_upload_rejects_path_only_extensions() -> Result<()> {
        let provider = DatasetProvider::new(None, TableLoader::default());
        for name in ["data.tsv", "data.ndjson"] {
            assert!(
                matches!(
                    provider.upload(name, b"a\tb\n1\t2\n"),
                    Err(TabulaError::UnsupportedFormat(_))
                ),
                "{name} is not an upload format"
            );
        }
        assert!(!provider.overrides().is_active(), "nothing was stored");
        Ok(())
    }

    #[test]
    fn test_corrupt_override_falls_back_to_path() -> Result<()> {
        let dir = TempDir::new()?;
        let path = temp_csv(&dir, "a,b\n1,2\n")?;
        let provider = DatasetProvider::new(Some(path.clone()), TableLoader::default());
        provider
            .overrides()
            .set(Snapshot::from_bytes(vec![0, 1, 2, 3]), "broken.csv");

        let table = provider.current()?;
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(provider.info().source, SourceKind::Path);
        assert_eq!(provider.overrides().get_name().as_deref(), Some("broken.csv"));
        Ok(())
    }
}
