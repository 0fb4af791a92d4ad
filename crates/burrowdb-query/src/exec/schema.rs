//! Column descriptions for the tuples a plan node produces.

use std::fmt;

use burrowdb_core::SqlType;

use crate::error::{QueryError, QueryResult};
use crate::expr::ColumnName;

/// Name, owning table and type of one output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Table (or alias) the column belongs to; `None` for computed columns.
    pub table_name: Option<String>,
    /// Declared or inferred type.
    pub sql_type: SqlType,
}

impl ColumnInfo {
    /// Creates a column description.
    #[must_use]
    pub fn new(name: impl Into<String>, table_name: Option<&str>, sql_type: SqlType) -> Self {
        Self { name: name.into(), table_name: table_name.map(str::to_string), sql_type }
    }

    /// Returns true if `name` refers to this column.
    ///
    /// An unqualified name matches on the column name alone.
    #[must_use]
    pub fn matches(&self, name: &ColumnName) -> bool {
        self.name == name.column
            && match &name.table {
                Some(table) => self.table_name.as_deref() == Some(table.as_str()),
                None => true,
            }
    }

    /// Returns the fully-qualified reference to this column.
    #[must_use]
    pub fn column_name(&self) -> ColumnName {
        ColumnName { table: self.table_name.clone(), column: self.name.clone() }
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.column_name(), self.sql_type)
    }
}

/// The ordered columns of a tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    /// Creates a schema from column descriptions.
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Creates an empty schema.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the columns in order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the column at `index`.
    #[must_use]
    pub fn column_info(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    /// Returns the indices of every column `name` refers to.
    #[must_use]
    pub fn find_columns(&self, name: &ColumnName) -> Vec<usize> {
        self.columns.iter().enumerate().filter(|(_, c)| c.matches(name)).map(|(i, _)| i).collect()
    }

    /// Resolves `name` to a single column index.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Evaluation`] if the name is unknown or ambiguous.
    pub fn column_index(&self, name: &ColumnName) -> QueryResult<usize> {
        match self.find_columns(name).as_slice() {
            [index] => Ok(*index),
            [] => Err(QueryError::evaluation(format!("unknown column {name}"))),
            _ => Err(QueryError::evaluation(format!("ambiguous column reference {name}"))),
        }
    }

    /// Returns the column names present in both schemas, in this schema's order.
    ///
    /// Table qualifiers are ignored; each name is reported once.
    #[must_use]
    pub fn common_column_names(&self, other: &Self) -> Vec<String> {
        let mut common: Vec<String> = Vec::new();
        for column in &self.columns {
            if other.columns.iter().any(|c| c.name == column.name) && !common.contains(&column.name)
            {
                common.push(column.name.clone());
            }
        }
        common
    }

    /// Returns this schema's columns followed by `other`'s.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Self { columns }
    }

    /// Returns a schema holding only the columns at `indices`.
    #[must_use]
    pub fn project(&self, indices: &[usize]) -> Self {
        Self { columns: indices.iter().filter_map(|&i| self.columns.get(i).cloned()).collect() }
    }

    /// Returns a copy with every column re-bound to `table_name`.
    #[must_use]
    pub fn with_table_name(&self, table_name: &str) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnInfo { table_name: Some(table_name.to_string()), ..c.clone() })
            .collect();
        Self { columns }
    }

    /// Estimated width of one row, in bytes.
    #[must_use]
    pub fn tuple_size(&self) -> f32 {
        self.columns.iter().map(|c| c.sql_type.storage_size() as f32).sum()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{column}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn schema(table: &str, names: &[&str]) -> Schema {
        Schema::new(names.iter().map(|n| ColumnInfo::new(*n, Some(table), SqlType::Integer)).collect())
    }

    #[test]
    fn column_lookup() {
        let s = schema("t1", &["a", "b"]).concat(&schema("t2", &["b", "c"]));
        assert_eq!(s.column_index(&ColumnName::new("a")).unwrap(), 0);
        assert_eq!(s.column_index(&ColumnName::qualified("t2", "b")).unwrap(), 2);
        assert!(s.column_index(&ColumnName::new("b")).is_err());
        assert!(s.column_index(&ColumnName::qualified("t3", "a")).is_err());
    }

    #[test]
    fn common_columns_in_left_order() {
        let left = schema("x", &["c", "a", "b"]);
        let right = schema("y", &["b", "c", "d"]);
        assert_eq!(left.common_column_names(&right), vec!["c".to_string(), "b".to_string()]);
        assert!(left.common_column_names(&schema("z", &["q"])).is_empty());
    }

    #[test]
    fn rename_rebinds_table() {
        let renamed = schema("t", &["a"]).with_table_name("r");
        assert_eq!(renamed.column_index(&ColumnName::qualified("r", "a")).unwrap(), 0);
        assert!(renamed.column_index(&ColumnName::qualified("t", "a")).is_err());
    }

    #[test]
    fn projection() {
        let s = schema("t", &["a", "b", "c"]).project(&[2, 0]);
        assert_eq!(s.to_string(), "[t.c:INTEGER, t.a:INTEGER]");
    }
}
