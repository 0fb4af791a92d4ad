//! Predicate filter.

use std::fmt;

use crate::ast::OrderByExpr;
use crate::error::QueryResult;
use crate::exec::node::{marking_unsupported, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::Tuple;
use crate::expr::{Environment, Expr};
use crate::plan::estimate_selectivity;

/// Passes through the child tuples for which the predicate is true.
///
/// NULL predicate results count as false.
pub struct FilterNode {
    base: NodeBase,
    predicate: Expr,
    child: BoxedNode,
}

impl FilterNode {
    /// Creates a filter over `child`.
    #[must_use]
    pub fn new(predicate: Expr, child: BoxedNode) -> Self {
        Self { base: NodeBase::new(), predicate, child }
    }

    /// Returns the predicate.
    #[must_use]
    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }
}

impl PlanNode for FilterNode {
    fn operation_type(&self) -> OperationType {
        OperationType::Select
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
        let config = self.base.config();
        let selectivity = estimate_selectivity(
            &self.predicate,
            &schema,
            self.child.column_stats(),
            &config.selectivity,
        );
        let child_cost = self.child.cost().unwrap_or_default();
        let cost = config.cost_model.filter(&child_cost, selectivity);
        let stats = self.child.column_stats().to_vec();
        self.base.set_prepared(schema.as_ref().clone(), cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.child.initialize()
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        let schema = self.base.schema();
        while let Some(tuple) = self.child.next_tuple()? {
            if self.predicate.evaluate_predicate(&Environment::with_tuple(&schema, tuple.values()))? {
                self.base.inc_tuples_produced();
                return Ok(Some(tuple));
            }
        }
        Ok(None)
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

    fn results_ordered_by(&self) -> Vec<OrderByExpr> {
        self.child.results_ordered_by()
    }

    fn duplicate(&self) -> BoxedNode {
        let mut copy = Self::new(self.predicate.clone(), self.child.duplicate());
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Select[pred: {}]", self.predicate)
    }
}
