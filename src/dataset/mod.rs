//! Dataset ingestion: format detection, parsing, caching and the upload
//! override, tied together by [`DatasetProvider`].

pub mod cache;
pub mod delimited;
pub mod format;
pub mod loader;
pub mod provider;
pub mod snapshot;
pub mod table;

pub use cache::SourceCache;
pub use format::Format;
pub use loader::TableLoader;
pub use provider::{DatasetInfo, DatasetProvider, SourceKind, UploadReceipt};
pub use snapshot::{OverrideSlot, Snapshot};
pub use table::{ColumnRef, Kind, Table};
