// Local SQLite mirror of the remote catalog
pub mod cache;
pub mod catalog;
pub mod schema;
pub mod sync;
mod tx;

pub use cache::{CacheStats, Download, LocalCache};
pub use schema::{SchemaState, SCHEMA_LEVEL};
pub use sync::{sync_task, CatalogSync, SyncStats};
