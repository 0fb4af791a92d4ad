//! Table and column statistics.

use burrowdb_core::Value;
use serde::{Deserialize, Serialize};

/// Statistics for one column. `None` means "unknown".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Smallest non-NULL value.
    pub min_value: Option<Value>,
    /// Largest non-NULL value.
    pub max_value: Option<Value>,
    /// Number of distinct non-NULL values.
    pub num_unique_values: Option<u64>,
    /// Number of NULLs.
    pub num_null_values: Option<u64>,
}

impl ColumnStats {
    /// Creates statistics with every field unknown.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Sets the value range.
    #[must_use]
    pub fn with_range(mut self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    /// Sets the distinct-value count.
    #[must_use]
    pub const fn with_unique_values(mut self, count: u64) -> Self {
        self.num_unique_values = Some(count);
        self
    }

    /// Sets the NULL count.
    #[must_use]
    pub const fn with_null_values(mut self, count: u64) -> Self {
        self.num_null_values = Some(count);
        self
    }

    /// Computes exact statistics over a column's values.
    #[must_use]
    pub fn from_values(values: &[Value]) -> Self {
        let mut present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
        let nulls = (values.len() - present.len()) as u64;
        present.sort_by(|a, b| a.total_cmp(b));
        present.dedup_by(|a, b| a.total_cmp(b).is_eq());
        Self {
            min_value: present.first().map(|v| (*v).clone()),
            max_value: present.last().map(|v| (*v).clone()),
            num_unique_values: Some(present.len() as u64),
            num_null_values: Some(nulls),
        }
    }
}

/// Statistics for a whole table, as computed by `analyze`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableStats {
    /// Number of live rows.
    pub num_tuples: u64,
    /// Number of allocated pages.
    pub num_data_pages: u64,
    /// Average row width in bytes.
    pub avg_tuple_size: f32,
    /// One entry per column.
    pub column_stats: Vec<ColumnStats>,
}

impl TableStats {
    /// Statistics for a table that was never analyzed.
    #[must_use]
    pub fn unknown(num_columns: usize) -> Self {
        Self { column_stats: vec![ColumnStats::unknown(); num_columns], ..Self::default() }
    }
}
