//! Table-alias rebinding.

use std::fmt;

use crate::error::QueryResult;
use crate::exec::node::{marking_unsupported, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::Tuple;

/// Re-binds every output column of its child to a new table name.
///
/// Planned for `FROM t AS x` and for derived tables.
pub struct RenameNode {
    base: NodeBase,
    table_name: String,
    child: BoxedNode,
}

impl RenameNode {
    /// Creates a rename of `child` to `table_name`.
    #[must_use]
    pub fn new(table_name: impl Into<String>, child: BoxedNode) -> Self {
        Self { base: NodeBase::new(), table_name: table_name.into(), child }
    }

    /// Returns the new table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl PlanNode for RenameNode {
    fn operation_type(&self) -> OperationType {
        OperationType::Rename
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
        let schema = self.child.schema().with_table_name(&self.table_name);
        let cost = self.child.cost().unwrap_or_default();
        let stats = self.child.column_stats().to_vec();
        self.base.set_prepared(schema, cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.child.initialize()
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        let tuple = self.child.next_tuple()?;
        if tuple.is_some() {
            self.base.inc_tuples_produced();
        }
        Ok(tuple)
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
        let mut copy = Self::new(self.table_name.clone(), self.child.duplicate());
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for RenameNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rename[resultTableName={}]", self.table_name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use burrowdb_core::Value;

    use super::*;
    use crate::exec::collect_tuples;
    use crate::exec::operators::ValuesNode;
    use crate::expr::ColumnName;

    #[test]
    fn rebinds_columns_and_passes_rows() {
        let values = ValuesNode::with_columns(vec!["a".into()], vec![vec![Value::Int(7)]]);
        let mut node = RenameNode::new("r", Box::new(values));
        node.prepare().unwrap();
        assert_eq!(node.schema().column_index(&ColumnName::qualified("r", "a")).unwrap(), 0);
        assert_eq!(collect_tuples(&mut node).unwrap(), vec![Tuple::from(vec![Value::Int(7)])]);
        assert_eq!(node.to_string(), "Rename[resultTableName=r]");
    }
}
