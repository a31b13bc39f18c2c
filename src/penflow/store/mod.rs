//! # Storage Layer
//!
//! This module holds everything between the library and the disk.
//!
//! ## Two Halves
//!
//! Storage is split the same way the rest of the crate is:
//! 1. **Table** ([`table::Table`]): the in-memory, schema-constrained
//!    `id → row` mapping. Every read and write hits this first.
//! 2. **Persister** ([`Persister`]): the durable-storage synchronizer. It only
//!    knows how to load and save a whole document of tables under a database
//!    name. It never sees individual operations.
//!
//! [`adapter::LibraryAdapter`] ties the two together, exposes typed CRUD over
//! [`MarkdownFile`](crate::model::MarkdownFile) records and fires change
//! listeners.
//!
//! ## Write Path
//!
//! ```text
//! LibraryAdapter::update_file
//!   ├── Table::set_partial_row        (immediate)
//!   ├── listeners(all files)          (immediate, synchronous)
//!   └── auto-save                     (flushes if the interval elapsed)
//!         └── Persister::save
//! ```
//!
//! The in-memory view is always consistent with the last write. The disk
//! catches up on the next write once the auto-save interval has elapsed,
//! or when the host calls `flush_if_due`, `flush` or `destroy`. Nothing in
//! this crate runs a timer: without periodic `flush_if_due` calls the last
//! write of a burst stays in memory until one of those happens, and a crash
//! before then loses it.
//!
//! ## Implementations
//!
//! - [`fs_persister::FsPersister`]: one JSON document per database name,
//!   written atomically (tmp file + rename).
//! - [`mem_persister::MemPersister`]: in-memory documents for tests, with
//!   failure simulation.
//!
//! ## Storage Layout
//!
//! ```text
//! <data dir>/
//! └── <database name>.json   # { "library": { "<id>": { row }, ... } }
//! ```

use crate::model::Row;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod adapter;
pub mod fs_persister;
pub mod mem_persister;
pub mod table;

/// Raw table contents keyed by row id, as found on disk.
///
/// Rows are kept as untyped JSON so that corrupt rows survive loading and can
/// be reported (and skipped) by the readers.
pub type RawTable = BTreeMap<String, serde_json::Value>;

/// Every table of a database, keyed by table name.
pub type PersistedTables = BTreeMap<String, RawTable>;

/// Failures of the underlying storage substrate.
///
/// These never reach callers on their own; the adapter wraps them in
/// [`PenflowError::Database`](crate::error::PenflowError::Database).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Durable-storage synchronizer.
///
/// A persister moves whole documents between memory and a durable substrate.
/// It is bound to a database name per call so that one persister instance
/// can back several databases.
pub trait Persister {
    /// Prepare the substrate for `db_name` (create directories, check access).
    fn open(&mut self, db_name: &str) -> StorageResult<()>;

    /// Load the persisted tables. `Ok(None)` when nothing was saved yet.
    fn load(&self, db_name: &str) -> StorageResult<Option<PersistedTables>>;

    /// Replace the persisted tables. Must not leave partial writes behind.
    fn save(&self, db_name: &str, tables: &PersistedTables) -> StorageResult<()>;

    /// Release any resources held for `db_name`.
    fn close(&mut self, _db_name: &str) -> StorageResult<()> {
        Ok(())
    }
}

/// Converts a typed row into the raw form stored in [`RawTable`].
pub fn row_to_raw(row: &Row) -> serde_json::Value {
    serde_json::Value::Object(row.clone())
}
