//! Storage core for the Folio CMS.
//! Owns the collection/index schema, the version record shape, uniqueness
//! error classification and result reordering. Everything that touches the
//! database goes through the handles `init_collections` returns.

pub mod collection;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod order;
pub mod provision;

pub use collection::{
    Collection, Document, IndexField, IndexInfo, IndexSpec, SortOrder, StoredDocument, ID_FIELD,
};
pub use config::{ConfigError, StoreConfig};
pub use db::{
    is_unique_error, open_db, open_db_in_memory, open_db_with_config, DbError, DbErrorCode,
    DbResult,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::version::{versions_for_page, VersionRecord, VersionSubject};
pub use order::{order_by_id, Identified};
pub use provision::{init_collections, CollectionSpec, Collections, COLLECTION_SPECS};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
