//! Runtime settings.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. built-in defaults ([`Settings::default`])
//! 2. `TABULA_*` environment variables (`TABULA_PORT=9000`, ...)
//! 3. the raw `DATASET_PATH` variable, which names the default dataset file
//!
//! A `.env` file in the working directory is loaded first, so either layer can
//! be supplied from there.

use crate::error::Result;
use crate::utils;
use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the default dataset file.
pub const DATASET_PATH_VAR: &str = "DATASET_PATH";

/// Default upload limit (200 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Bytes of delimited text inspected when sniffing a separator.
pub const DEFAULT_SNIFF_SAMPLE_BYTES: usize = 128 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default dataset file; absent means uploads are the only source
    pub dataset_path: Option<String>,
    pub bind_address: String,
    pub port: u16,
    /// Directory for rolling log files; platform data dir when unset
    pub log_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub sniff_sample_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_path: None,
            bind_address: "127.0.0.1".to_owned(),
            port: 8000,
            log_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sniff_sample_bytes: DEFAULT_SNIFF_SAMPLE_BYTES,
        }
    }
}

impl Settings {
    /// Load `.env`, then extract settings from the process environment.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!("Ignoring unreadable .env file: {e}");
        }

        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Env::prefixed("TABULA_"))
                .merge(Env::raw().only(&[DATASET_PATH_VAR])),
        )
    }

    /// Extract settings from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut settings: Self = figment.extract()?;
        settings.dataset_path = settings
            .dataset_path
            .as_deref()
            .and_then(utils::normalize_path_setting);
        Ok(settings)
    }

    /// The configured dataset path, normalised, if any.
    pub fn dataset_path(&self) -> Option<PathBuf> {
        self.dataset_path.as_ref().map(PathBuf::from)
    }
}
