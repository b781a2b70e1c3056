use crate::error::{Result, TabulaError};
use crate::utils;
use serde::Serialize;

/// File formats tabula can turn into a [`super::Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Excel,
    Parquet,
    Json,
}

impl Format {
    /// Extensions accepted by the upload endpoint.
    pub const UPLOAD_EXTENSIONS: [&'static str; 5] = ["csv", "xlsx", "xls", "parquet", "json"];

    /// Picks the format from the file name's extension, case-insensitively.
    ///
    /// Content is never sniffed here; dialect detection for delimited text
    /// happens inside the loader.
    pub fn detect(file_name: &str) -> Result<Self> {
        let ext = utils::extension_of(file_name);
        match ext.as_str() {
            "csv" | "tsv" => Ok(Self::Csv),
            "xlsx" | "xls" => Ok(Self::Excel),
            "parquet" => Ok(Self::Parquet),
            "json" | "jsonl" | "ndjson" => Ok(Self::Json),
            "" => Err(TabulaError::UnsupportedFormat(format!(
                "'{file_name}' has no extension"
            ))),
            _ => Err(TabulaError::UnsupportedFormat(ext)),
        }
    }

    /// Like [`Format::detect`], restricted to [`Format::UPLOAD_EXTENSIONS`].
    pub fn detect_upload(file_name: &str) -> Result<Self> {
        let ext = utils::extension_of(file_name);
        if !Self::UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
            return Err(TabulaError::UnsupportedFormat(if ext.is_empty() {
                format!("'{file_name}' has no extension")
            } else {
                ext
            }));
        }
        Self::detect(file_name)
    }
}
