//! Projection.

use std::fmt;

use burrowdb_core::Value;

use crate::ast::SelectValue;
use crate::error::{QueryError, QueryResult};
use crate::exec::node::{marking_unsupported, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::{ColumnInfo, Schema, Tuple};
use crate::expr::{Environment, Expr};
use crate::plan::ColumnStats;

/// One output column, resolved against the child schema.
#[derive(Debug, Clone)]
enum Output {
    /// Copy a child column.
    Column(usize),
    /// Evaluate an expression.
    Computed(Expr),
}

/// Computes a new tuple from each child tuple.
///
/// Wildcards expand to the child's columns; a bare column reference keeps
/// its table qualifier unless aliased.
pub struct ProjectNode {
    base: NodeBase,
    projection: Vec<SelectValue>,
    child: BoxedNode,
    outputs: Vec<Output>,
}

impl ProjectNode {
    /// Creates a projection of `child`.
    #[must_use]
    pub fn new(projection: Vec<SelectValue>, child: BoxedNode) -> Self {
        Self { base: NodeBase::new(), projection, child, outputs: Vec::new() }
    }

    /// Returns the select list.
    #[must_use]
    pub fn projection(&self) -> &[SelectValue] {
        &self.projection
    }

    fn resolve(&self, input: &Schema) -> QueryResult<Vec<(Output, ColumnInfo)>> {
        let mut resolved = Vec::new();
        for value in &self.projection {
            match value {
                SelectValue::Wildcard { table: None } => {
                    resolved.extend(
                        input.columns().iter().enumerate().map(|(i, c)| (Output::Column(i), c.clone())),
                    );
                }
                SelectValue::Wildcard { table: Some(table) } => {
                    let before = resolved.len();
                    resolved.extend(
                        input
                            .columns()
                            .iter()
                            .enumerate()
                            .filter(|(_, c)| c.table_name.as_deref() == Some(table.as_str()))
                            .map(|(i, c)| (Output::Column(i), c.clone())),
                    );
                    if resolved.len() == before {
                        return Err(QueryError::InvalidArgument(format!(
                            "{table}.* does not match any table in the input"
                        )));
                    }
                }
                SelectValue::Expr { expr, alias } => {
                    let column = expr.as_column().map(|name| input.column_index(name)).transpose()?;
                    resolved.push(match (column, alias) {
                        (Some(index), None) => {
                            let info = input.column_info(index).cloned().ok_or_else(|| {
                                QueryError::invalid_state(format!("column {index} out of range"))
                            })?;
                            (Output::Column(index), info)
                        }
                        (Some(index), Some(alias)) => {
                            let sql_type = expr.sql_type(input);
                            (Output::Column(index), ColumnInfo::new(alias.clone(), None, sql_type))
                        }
                        (None, _) => {
                            let name = alias.clone().unwrap_or_else(|| expr.to_string());
                            let info = ColumnInfo::new(name, None, expr.sql_type(input));
                            (Output::Computed(expr.clone()), info)
                        }
                    });
                }
            }
        }
        Ok(resolved)
    }
}

impl PlanNode for ProjectNode {
    fn operation_type(&self) -> OperationType {
        OperationType::Project
    }

    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        vec![self.child.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        vec![self.child.as_mut()]
    }

    fn prepare(&mut self) -> QueryResult<()> {
        self.child.prepare()?;
        let input = self.child.schema();
        let (outputs, columns): (Vec<_>, Vec<_>) = self.resolve(&input)?.into_iter().unzip();
        let child_stats = self.child.column_stats();
        let stats = outputs
            .iter()
            .map(|o| match o {
                Output::Column(i) => child_stats.get(*i).cloned().unwrap_or_else(ColumnStats::unknown),
                Output::Computed(_) => ColumnStats::unknown(),
            })
            .collect();
        let schema = Schema::new(columns);
        let child_cost = self.child.cost().unwrap_or_default();
        let cost = self.base.config().cost_model.project(&child_cost, schema.tuple_size());
        self.outputs = outputs;
        self.base.set_prepared(schema, cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.child.initialize()
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        let Some(input) = self.child.next_tuple()? else {
            return Ok(None);
        };
        let schema = self.child.schema();
        let env = Environment::with_tuple(&schema, input.values());
        let values = self
            .outputs
            .iter()
            .map(|output| match output {
                Output::Column(i) => Ok(input.get(*i).cloned().unwrap_or(Value::Null)),
                Output::Computed(expr) => expr.evaluate(&env),
            })
            .collect::<QueryResult<Vec<_>>>()?;
        self.base.inc_tuples_produced();
        Ok(Some(Tuple::new(values)))
    }

    fn supports_marking(&self) -> bool {
        self.child.supports_marking()
    }

    fn mark_current_position(&mut self) -> QueryResult<()> {
        if !self.supports_marking() {
            return Err(marking_unsupported(self.operation_type()));
        }
        self.child.mark_current_position()
    }

    fn reset_to_last_mark(&mut self) -> QueryResult<()> {
        if !self.supports_marking() {
            return Err(marking_unsupported(self.operation_type()));
        }
        self.child.reset_to_last_mark()
    }

    fn duplicate(&self) -> BoxedNode {
        let mut copy = Self::new(self.projection.clone(), self.child.duplicate());
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for ProjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project[values: ")?;
        for (i, value) in self.projection.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}
