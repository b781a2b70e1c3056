//! # tabula - dataset ingestion and profiling
//!
//! tabula loads one tabular dataset (a configured file or an ad-hoc upload)
//! and answers descriptive-statistics queries about it for a data-quality
//! dashboard.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabula::dataset::{DatasetProvider, TableLoader};
//! use tabula::profiling;
//!
//! # fn main() -> anyhow::Result<()> {
//! let provider = DatasetProvider::new(Some("data/sales.csv".into()), TableLoader::default());
//! let table = provider.current()?;
//!
//! let summary = profiling::summary(&table)?;
//! println!("{} rows, {} null cells", summary.rows, summary.null_cells);
//!
//! for col in profiling::outliers(&table)? {
//!     println!("{}: {} outliers", col.column, col.outliers);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`dataset`]: format detection, the delimited-text fallback chain, the
//!   mtime-keyed source cache and the upload override
//!   - [`dataset::delimited`]: encodings, separator inference and sniffing
//!   - [`dataset::provider`]: picks the current table
//! - [`profiling`]: summary, nulls, cardinality, outliers, distributions,
//!   duplicates, boxplots and percentile descriptions
//! - [`http`]: actix-web routes over the profiling functions
//! - [`config`]: settings from `.env` and the environment
//! - [`error`]: error types and handling utilities
//! - [`logging`]: console and rolling-file tracing setup
//!
//! ## Data flow
//!
//! ```text
//! bytes / path ──> TableLoader ──> Table ──> profiling::* ──> JSON
//!                      ▲
//!        SourceCache ──┤ (configured path, reloaded when mtime changes)
//!       OverrideSlot ──┘ (last upload, preferred when present)
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod http;
pub mod logging;
pub mod profiling;
pub mod utils;
