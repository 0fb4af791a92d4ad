//! Literal rows.

use std::fmt;

use burrowdb_core::{SqlType, Value};

use crate::error::{QueryError, QueryResult};
use crate::exec::node::{no_mark, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::{ColumnInfo, Schema, Tuple};
use crate::plan::ColumnStats;

/// Produces a fixed list of rows.
///
/// Used for `SELECT` without `FROM` and as a test input.
pub struct ValuesNode {
    base: NodeBase,
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
    position: usize,
    mark: Option<usize>,
}

impl ValuesNode {
    /// Creates a node producing `rows` under the given columns.
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self { base: NodeBase::new(), columns, rows, position: 0, mark: None }
    }

    /// Creates a node with unqualified columns whose types are inferred from the rows.
    #[must_use]
    pub fn with_columns(names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let sql_type = rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .find(|v| !v.is_null())
                    .map_or(SqlType::Integer, infer_type);
                ColumnInfo::new(name, None, sql_type)
            })
            .collect();
        Self::new(columns, rows)
    }

    /// A single row with no columns: the input of `SELECT 1 + 1`.
    #[must_use]
    pub fn single_empty_row() -> Self {
        Self::new(Vec::new(), vec![Vec::new()])
    }
}

fn infer_type(value: &Value) -> SqlType {
    match value {
        Value::Bool(_) => SqlType::Boolean,
        Value::Float(_) => SqlType::Double,
        Value::String(s) => SqlType::VarChar(u16::try_from(s.chars().count()).unwrap_or(u16::MAX)),
        Value::Null | Value::Int(_) => SqlType::BigInt,
    }
}

impl PlanNode for ValuesNode {
    fn operation_type(&self) -> OperationType {
        OperationType::Values
    }

    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn prepare(&mut self) -> QueryResult<()> {
        if let Some(row) = self.rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(QueryError::InvalidArgument(format!(
                "row has {} values but {} columns were declared",
                row.len(),
                self.columns.len()
            )));
        }
        let schema = Schema::new(self.columns.clone());
        let cost = self.base.config().cost_model.values(self.rows.len(), schema.tuple_size());
        let stats = (0..self.columns.len())
            .map(|i| {
                let column: Vec<Value> = self.rows.iter().map(|r| r[i].clone()).collect();
                ColumnStats::from_values(&column)
            })
            .collect();
        self.base.set_prepared(schema, cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.position = 0;
        Ok(())
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        let Some(row) = self.rows.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        self.base.inc_tuples_produced();
        Ok(Some(Tuple::new(row.clone())))
    }

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark_current_position(&mut self) -> QueryResult<()> {
        self.mark = Some(self.position);
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> QueryResult<()> {
        self.position = self.mark.ok_or_else(|| no_mark(self.operation_type()))?;
        Ok(())
    }

    fn duplicate(&self) -> BoxedNode {
        Box::new(Self {
            base: self.base.fresh(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            position: 0,
            mark: None,
        })
    }
}

impl fmt::Display for ValuesNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Values[rows={}]", self.rows.len())
    }
}
