//! In-memory sort.

use std::fmt;

use burrowdb_core::Value;
use tracing::debug;

use crate::ast::OrderByExpr;
use crate::error::QueryResult;
use crate::exec::node::{no_mark, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::Tuple;
use crate::expr::{compare_keys, Environment};

/// Materializes its child and returns the tuples ordered by the sort keys.
///
/// The sort is stable. NULLs sort first in ascending order. Materialized
/// tuples are unpinned, so the node supports marking regardless of its child.
pub struct SortNode {
    base: NodeBase,
    order_by: Vec<OrderByExpr>,
    child: BoxedNode,
    rows: Vec<Tuple>,
    loaded: bool,
    position: usize,
    mark: Option<usize>,
}

impl SortNode {
    /// Creates a sort of `child`.
    #[must_use]
    pub fn new(order_by: Vec<OrderByExpr>, child: BoxedNode) -> Self {
        Self {
            base: NodeBase::new(),
            order_by,
            child,
            rows: Vec::new(),
            loaded: false,
            position: 0,
            mark: None,
        }
    }

    fn load(&mut self) -> QueryResult<()> {
        let schema = self.child.schema();
        let ascending: Vec<bool> = self.order_by.iter().map(|k| k.ascending).collect();
        let mut keyed: Vec<(Vec<Value>, Tuple)> = Vec::new();
        while let Some(mut tuple) = self.child.next_tuple()? {
            tuple.unpin();
            let env = Environment::with_tuple(&schema, tuple.values());
            let keys = self
                .order_by
                .iter()
                .map(|k| k.expr.evaluate(&env))
                .collect::<QueryResult<Vec<_>>>()?;
            keyed.push((keys, tuple));
        }
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &ascending));
        debug!(rows = keyed.len(), "sorted input");
        self.rows = keyed.into_iter().map(|(_, tuple)| tuple).collect();
        self.loaded = true;
        Ok(())
    }
}

impl PlanNode for SortNode {
    fn operation_type(&self) -> OperationType {
        OperationType::Sort
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
        let schema = self.child.schema();
        for key in &self.order_by {
            for name in key.expr.columns() {
                schema.column_index(name)?;
            }
        }
        let cost = self.base.config().cost_model.sort(&self.child.cost().unwrap_or_default());
        let stats = self.child.column_stats().to_vec();
        self.base.set_prepared(schema.as_ref().clone(), cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.rows.clear();
        self.loaded = false;
        self.position = 0;
        self.child.initialize()
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.loaded {
            self.load()?;
        }
        let Some(tuple) = self.rows.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        self.base.inc_tuples_produced();
        Ok(Some(tuple.clone()))
    }

    fn clean_up(&mut self) -> QueryResult<()> {
        self.rows = Vec::new();
        self.loaded = false;
        self.child.clean_up()
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

    fn results_ordered_by(&self) -> Vec<OrderByExpr> {
        self.order_by.clone()
    }

    fn duplicate(&self) -> BoxedNode {
        let mut copy = Self::new(self.order_by.clone(), self.child.duplicate());
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for SortNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sort[")?;
        for (i, key) in self.order_by.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::collect_tuples;
    use crate::exec::operators::ValuesNode;
    use crate::expr::Expr;

    fn input() -> BoxedNode {
        Box::new(ValuesNode::with_columns(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Int(2), Value::from("x")],
                vec![Value::Null, Value::from("y")],
                vec![Value::Int(1), Value::from("z")],
                vec![Value::Int(2), Value::from("w")],
            ],
        ))
    }

    fn first_column(tuples: &[Tuple]) -> Vec<Value> {
        tuples.iter().map(|t| t.values()[0].clone()).collect()
    }

    #[test]
    fn ascending_is_stable_with_nulls_first() {
        let mut node = SortNode::new(vec![OrderByExpr::asc(Expr::column("a"))], input());
        node.prepare().unwrap();
        let tuples = collect_tuples(&mut node).unwrap();
        assert_eq!(first_column(&tuples), vec![Value::Null, Value::Int(1), Value::Int(2), Value::Int(2)]);
        assert_eq!(tuples[2].values()[1], Value::from("x"));
        assert_eq!(node.results_ordered_by().len(), 1);
    }

    #[test]
    fn descending_with_tiebreak() {
        let mut node = SortNode::new(
            vec![OrderByExpr::desc(Expr::column("a")), OrderByExpr::asc(Expr::column("b"))],
            input(),
        );
        node.prepare().unwrap();
        let tuples = collect_tuples(&mut node).unwrap();
        assert_eq!(first_column(&tuples), vec![Value::Int(2), Value::Int(2), Value::Int(1), Value::Null]);
        assert_eq!(tuples[0].values()[1], Value::from("w"));
        assert_eq!(node.to_string(), "Sort[a DESC, b ASC]");
    }

    #[test]
    fn marking_replays_materialized_rows() {
        let mut node = SortNode::new(vec![OrderByExpr::asc(Expr::column("a"))], input());
        node.prepare().unwrap();
        node.initialize().unwrap();
        node.next_tuple().unwrap();
        node.mark_current_position().unwrap();
        let second = node.next_tuple().unwrap();
        node.next_tuple().unwrap();
        node.reset_to_last_mark().unwrap();
        assert_eq!(node.next_tuple().unwrap(), second);
    }

    #[test]
    fn unknown_sort_key_fails_prepare() {
        let mut node = SortNode::new(vec![OrderByExpr::asc(Expr::column("zz"))], input());
        assert!(node.prepare().is_err());
    }
}
