//! Table storage used by the plan nodes.
//!
//! The planner only needs a [`TableCatalog`] that can open a table by name.
//! [`MemoryStorage`] is the in-process implementation: rows live in
//! fixed-capacity pages, scans pin the page each tuple came from, and
//! `analyze` computes the statistics the selectivity estimator consumes.

mod memory;
mod page;

use std::sync::Arc;

use burrowdb_core::CoreError;
use thiserror::Error;

use crate::error::QueryResult;
use crate::exec::Schema;
use crate::plan::TableStats;

pub use memory::{MemoryStorage, MemoryTable, StorageConfig};
pub use page::PagePin;

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No table with this name exists.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A table with this name already exists.
    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    /// A tuple location does not name a live row.
    #[error("invalid tuple location: {0}")]
    InvalidLocation(String),

    /// A row has the wrong number of values.
    #[error("table {table} has {expected} columns, got {actual} values")]
    ColumnCount {
        /// The table.
        table: String,
        /// Number of columns in the table.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// A value does not fit its column.
    #[error("invalid value: {0}")]
    InvalidValue(#[from] CoreError),

    /// An internal lock was poisoned (a thread panicked while holding it).
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    /// Creates a lock poisoned error.
    #[must_use]
    pub fn lock_poisoned(msg: impl Into<String>) -> Self {
        Self::LockPoisoned(msg.into())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Everything a scan needs to read one table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Column layout, with every column bound to the table name.
    pub schema: Arc<Schema>,
    /// Statistics from the last `analyze`, or defaults if never analyzed.
    pub stats: TableStats,
    /// The stored rows.
    pub table: Arc<MemoryTable>,
}

/// Opens tables by name.
pub trait TableCatalog: Send + Sync {
    /// Opens `name` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableNotFound`] (as a query error) for unknown tables.
    fn open_table(&self, name: &str) -> QueryResult<TableInfo>;
}
