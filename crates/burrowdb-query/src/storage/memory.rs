//! In-memory paged table storage.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use burrowdb_core::{SqlType, Value};
use tracing::{debug, info};

use super::page::{Page, PagePin};
use super::{StorageError, StorageResult, TableCatalog, TableInfo};
use crate::error::QueryResult;
use crate::exec::{ColumnInfo, Schema, Tuple, TupleLocation};
use crate::plan::{ColumnStats, TableStats};

/// Default number of rows stored per page.
pub const DEFAULT_ROWS_PER_PAGE: usize = 64;

/// Storage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Number of row slots per page.
    pub rows_per_page: usize,
}

impl StorageConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows_per_page: DEFAULT_ROWS_PER_PAGE }
    }

    /// Sets the number of row slots per page (at least one).
    #[must_use]
    pub const fn with_rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = if rows == 0 { 1 } else { rows };
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The rows of one table.
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    schema: Arc<Schema>,
    rows_per_page: usize,
    pages: RwLock<Vec<Arc<Page>>>,
    stats: RwLock<Option<TableStats>>,
}

impl MemoryTable {
    fn new(name: &str, schema: Schema, rows_per_page: usize) -> Self {
        Self {
            name: name.to_string(),
            schema: Arc::new(schema),
            rows_per_page,
            pages: RwLock::new(Vec::new()),
            stats: RwLock::new(None),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column layout.
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Returns the number of allocated pages.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if the page list lock is poisoned.
    pub fn page_count(&self) -> StorageResult<usize> {
        Ok(self.read_pages()?.len())
    }

    /// Returns the first live row at or after `(page, slot)`, pinned.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if a page lock is poisoned.
    pub fn read_from(&self, page: usize, slot: usize) -> StorageResult<Option<Tuple>> {
        let pages = self.read_pages()?;
        let mut start_slot = slot;
        for (page_no, page_ref) in pages.iter().enumerate().skip(page) {
            let slots = page_ref.slots.read().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
            for (slot_no, row) in slots.iter().enumerate().skip(start_slot) {
                if let Some(values) = row {
                    let location = TupleLocation { table: self.name.clone(), page: page_no, slot: slot_no };
                    let pin = PagePin::new(Arc::clone(page_ref), page_no);
                    return Ok(Some(Tuple::from_storage(values.clone(), location, pin)));
                }
            }
            start_slot = 0;
        }
        Ok(None)
    }

    fn read_pages(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Vec<Arc<Page>>>> {
        self.pages.read().map_err(|e| StorageError::lock_poisoned(e.to_string()))
    }

    fn coerce_row(&self, values: Vec<Value>) -> StorageResult<Vec<Value>> {
        if values.len() != self.schema.len() {
            return Err(StorageError::ColumnCount {
                table: self.name.clone(),
                expected: self.schema.len(),
                actual: values.len(),
            });
        }
        values
            .into_iter()
            .zip(self.schema.columns())
            .map(|(value, column)| column.sql_type.coerce(value).map_err(StorageError::from))
            .collect()
    }

    fn insert(&self, values: Vec<Value>) -> StorageResult<TupleLocation> {
        let row = self.coerce_row(values)?;
        let mut pages = self.pages.write().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
        if let Some((page_no, page)) = pages.iter().enumerate().last() {
            let mut slots = page.slots.write().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
            if slots.len() < self.rows_per_page {
                slots.push(Some(row));
                return Ok(TupleLocation { table: self.name.clone(), page: page_no, slot: slots.len() - 1 });
            }
        }
        let page = Page::default();
        page.slots.write().map_err(|e| StorageError::lock_poisoned(e.to_string()))?.push(Some(row));
        pages.push(Arc::new(page));
        Ok(TupleLocation { table: self.name.clone(), page: pages.len() - 1, slot: 0 })
    }

    fn replace(&self, location: &TupleLocation, row: Option<Vec<Value>>) -> StorageResult<()> {
        let pages = self.read_pages()?;
        let invalid = || StorageError::InvalidLocation(location.to_string());
        let page = pages.get(location.page).ok_or_else(invalid)?;
        let mut slots = page.slots.write().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
        match slots.get_mut(location.slot) {
            Some(slot) if slot.is_some() => {
                *slot = row;
                Ok(())
            }
            _ => Err(invalid()),
        }
    }

    fn pinned_pages(&self) -> StorageResult<usize> {
        Ok(self.read_pages()?.iter().filter(|p| p.pin_count() > 0).count())
    }

    fn analyze(&self) -> StorageResult<TableStats> {
        let pages = self.read_pages()?;
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); self.schema.len()];
        let mut num_tuples: u64 = 0;
        let mut total_size: usize = 0;
        for page in pages.iter() {
            let slots = page.slots.read().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
            for values in slots.iter().flatten() {
                num_tuples += 1;
                total_size += values.iter().map(value_size).sum::<usize>();
                for (column, value) in columns.iter_mut().zip(values) {
                    column.push(value.clone());
                }
            }
        }
        let avg_tuple_size = if num_tuples == 0 {
            self.schema.columns().iter().map(|c| c.sql_type.storage_size()).sum::<usize>() as f32
        } else {
            total_size as f32 / num_tuples as f32
        };
        let stats = TableStats {
            num_tuples,
            num_data_pages: pages.len() as u64,
            avg_tuple_size,
            column_stats: columns.iter().map(|values| ColumnStats::from_values(values)).collect(),
        };
        drop(pages);
        *self.stats.write().map_err(|e| StorageError::lock_poisoned(e.to_string()))? = Some(stats.clone());
        Ok(stats)
    }

    fn current_stats(&self) -> StorageResult<TableStats> {
        let cached = self.stats.read().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
        Ok(cached.clone().unwrap_or_else(|| TableStats::unknown(self.schema.len())))
    }
}

/// Approximate stored width of a value, in bytes.
fn value_size(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 8,
        Value::String(s) => s.len() + 2,
    }
}

/// A catalog of in-memory tables.
///
/// # Example
///
/// ```
/// use burrowdb_core::{SqlType, Value};
/// use burrowdb_query::storage::{MemoryStorage, TableCatalog};
///
/// let storage = MemoryStorage::new();
/// storage.create_table("t", &[("a", SqlType::Integer)]).unwrap();
/// storage.insert("t", vec![Value::Int(1)]).unwrap();
/// let stats = storage.analyze("t").unwrap();
/// assert_eq!(stats.num_tuples, 1);
/// assert_eq!(storage.open_table("t").unwrap().stats.num_tuples, 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    config: StorageConfig,
    tables: RwLock<BTreeMap<String, Arc<MemoryTable>>>,
}

impl MemoryStorage {
    /// Creates an empty catalog with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StorageConfig::new())
    }

    /// Creates an empty catalog.
    #[must_use]
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config, tables: RwLock::new(BTreeMap::new()) }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Creates an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableAlreadyExists`] if the name is taken.
    pub fn create_table(&self, name: &str, columns: &[(&str, SqlType)]) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
        if tables.contains_key(name) {
            return Err(StorageError::TableAlreadyExists(name.to_string()));
        }
        let schema = Schema::new(
            columns.iter().map(|(column, sql_type)| ColumnInfo::new(*column, Some(name), *sql_type)).collect(),
        );
        info!(table = name, columns = columns.len(), "created table");
        tables.insert(name.to_string(), Arc::new(MemoryTable::new(name, schema, self.config.rows_per_page)));
        Ok(())
    }

    /// Appends a row, coercing each value to its column type.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tables, wrong arity, or values that do not fit.
    pub fn insert(&self, table: &str, values: Vec<Value>) -> StorageResult<TupleLocation> {
        self.table(table)?.insert(values)
    }

    /// Overwrites the row at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidLocation`] if no live row is there.
    pub fn update(&self, location: &TupleLocation, values: Vec<Value>) -> StorageResult<()> {
        let table = self.table(&location.table)?;
        let row = table.coerce_row(values)?;
        table.replace(location, Some(row))
    }

    /// Deletes the row at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidLocation`] if no live row is there.
    pub fn delete(&self, location: &TupleLocation) -> StorageResult<()> {
        self.table(&location.table)?.replace(location, None)
    }

    /// Recomputes and stores the statistics of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableNotFound`] for unknown tables.
    pub fn analyze(&self, table: &str) -> StorageResult<TableStats> {
        let stats = self.table(table)?.analyze()?;
        debug!(table, num_tuples = stats.num_tuples, pages = stats.num_data_pages, "analyzed table");
        Ok(stats)
    }

    /// Returns the number of pages, across all tables, that are currently pinned.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockPoisoned`] if a lock is poisoned.
    pub fn pinned_pages(&self) -> StorageResult<usize> {
        let tables = self.tables.read().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
        tables.values().map(|t| t.pinned_pages()).sum()
    }

    fn table(&self, name: &str) -> StorageResult<Arc<MemoryTable>> {
        let tables = self.tables.read().map_err(|e| StorageError::lock_poisoned(e.to_string()))?;
        tables.get(name).cloned().ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }
}

impl TableCatalog for MemoryStorage {
    fn open_table(&self, name: &str) -> QueryResult<TableInfo> {
        let table = self.table(name)?;
        Ok(TableInfo {
            name: table.name.clone(),
            schema: table.schema(),
            stats: table.current_stats()?,
            table,
        })
    }
}
