//! LIMIT and OFFSET.

use std::fmt;

use crate::ast::OrderByExpr;
use crate::error::QueryResult;
use crate::exec::node::{marking_unsupported, no_mark, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::Tuple;

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    skipped: u64,
    returned: u64,
    done: bool,
}

/// Skips the first `offset` child tuples and returns at most `limit` of the rest.
///
/// Tuples are passed through unmodified and in child order. Once the limit
/// is reached the child is not pulled again until the next `initialize()`;
/// `LIMIT 0` never pulls at all.
pub struct LimitNode {
    base: NodeBase,
    limit: Option<u64>,
    offset: u64,
    child: BoxedNode,
    counters: Counters,
    mark: Option<Counters>,
}

impl LimitNode {
    /// Creates a limit/offset node.
    #[must_use]
    pub fn new(limit: Option<u64>, offset: u64, child: BoxedNode) -> Self {
        Self { base: NodeBase::new(), limit, offset, child, counters: Counters::default(), mark: None }
    }

    /// Creates a limit-only node.
    #[must_use]
    pub fn limit(limit: u64, child: BoxedNode) -> Self {
        Self::new(Some(limit), 0, child)
    }

    /// Returns the limit.
    #[must_use]
    pub const fn max_tuples(&self) -> Option<u64> {
        self.limit
    }

    /// Returns the offset.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.counters.returned >= limit)
    }
}

impl PlanNode for LimitNode {
    fn operation_type(&self) -> OperationType {
        OperationType::Limit
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
        let child_cost = self.child.cost().unwrap_or_default();
        let cost = self.base.config().cost_model.limit(&child_cost, self.limit, self.offset);
        let schema = self.child.schema().as_ref().clone();
        let stats = self.child.column_stats().to_vec();
        self.base.set_prepared(schema, cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.counters = Counters::default();
        self.child.initialize()
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        if self.counters.done || self.limit_reached() {
            self.counters.done = true;
            return Ok(None);
        }
        while self.counters.skipped < self.offset {
            if self.child.next_tuple()?.is_none() {
                self.counters.done = true;
                return Ok(None);
            }
            self.counters.skipped += 1;
        }
        match self.child.next_tuple()? {
            Some(tuple) => {
                self.counters.returned += 1;
                self.base.inc_tuples_produced();
                Ok(Some(tuple))
            }
            None => {
                self.counters.done = true;
                Ok(None)
            }
        }
    }

    fn supports_marking(&self) -> bool {
        self.child.supports_marking()
    }

    fn mark_current_position(&mut self) -> QueryResult<()> {
        if !self.supports_marking() {
            return Err(marking_unsupported(self.operation_type()));
        }
        self.child.mark_current_position()?;
        self.mark = Some(self.counters);
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> QueryResult<()> {
        if !self.supports_marking() {
            return Err(marking_unsupported(self.operation_type()));
        }
        let counters = self.mark.ok_or_else(|| no_mark(self.operation_type()))?;
        self.child.reset_to_last_mark()?;
        self.counters = counters;
        Ok(())
    }

    fn results_ordered_by(&self) -> Vec<OrderByExpr> {
        self.child.results_ordered_by()
    }

    fn duplicate(&self) -> BoxedNode {
        let mut copy = Self::new(self.limit, self.offset, self.child.duplicate());
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for LimitNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "Limit[limit={limit}, offset={}]", self.offset),
            None => write!(f, "Limit[offset={}]", self.offset),
        }
    }
}
