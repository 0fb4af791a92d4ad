//! Nested-loops join.
//!
//! One incremental state machine covers every join type. For each left
//! tuple the right child is re-initialized and scanned in full (or until a
//! semijoin/antijoin decision is made). Neither side is materialized; FULL
//! OUTER only remembers which right ordinals have matched so the unmatched
//! right tuples can be emitted in a final pass over the right child.

use std::fmt;
use std::sync::Arc;

use crate::ast::JoinType;
use crate::error::{QueryError, QueryResult};
use crate::exec::node::{marking_unsupported, no_mark, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::{Schema, Tuple};
use crate::expr::{Environment, Expr};
use crate::plan::estimate_selectivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinState {
    /// No left tuple fetched yet.
    Start,
    /// Pairing the current left tuple with right tuples.
    Scanning { matched: bool },
    /// Emit the current left tuple padded with NULLs.
    EmittingNullPad,
    /// Emit the current left tuple alone (antijoin).
    EmittingUnmatched,
    /// Left exhausted; emitting NULL-padded right tuples that never matched.
    EmittingRightUnmatched,
    Exhausted,
}

#[derive(Debug, Clone)]
struct JoinMark {
    state: JoinState,
    left_tuple: Option<Tuple>,
    break_inner: bool,
    inner_empty: bool,
    right_ordinal: usize,
    matched_right: Vec<bool>,
}

/// Joins two children by rescanning the right child for every left tuple.
///
/// `RightOuter` is not executed directly: plan it as a `LeftOuter` join with
/// the children exchanged and call [`swap_output`](Self::swap_output) so the
/// output columns come back in the original order.
pub struct NestedLoopJoinNode {
    base: NodeBase,
    join_type: JoinType,
    predicate: Option<Expr>,
    left: BoxedNode,
    right: BoxedNode,
    swapped: bool,
    left_schema: Arc<Schema>,
    right_schema: Arc<Schema>,
    state: JoinState,
    left_tuple: Option<Tuple>,
    /// Skip the rest of the inner scan and move to the next left tuple.
    break_inner: bool,
    /// No right tuple has been seen since `initialize()`.
    inner_empty: bool,
    right_ordinal: usize,
    matched_right: Vec<bool>,
    mark: Option<JoinMark>,
}

impl NestedLoopJoinNode {
    /// Creates a join of `left` and `right`. A missing predicate matches every pair.
    #[must_use]
    pub fn new(join_type: JoinType, predicate: Option<Expr>, left: BoxedNode, right: BoxedNode) -> Self {
        Self {
            base: NodeBase::new(),
            join_type,
            predicate,
            left,
            right,
            swapped: false,
            left_schema: Arc::default(),
            right_schema: Arc::default(),
            state: JoinState::Start,
            left_tuple: None,
            break_inner: false,
            inner_empty: true,
            right_ordinal: 0,
            matched_right: Vec::new(),
            mark: None,
        }
    }

    /// Emits right columns before left columns, undoing a child exchange.
    #[must_use]
    pub fn swap_output(mut self) -> Self {
        self.swapped = !self.swapped;
        self
    }

    /// Returns true if the output column order is swapped.
    #[must_use]
    pub const fn swapped(&self) -> bool {
        self.swapped
    }

    /// Returns the join type.
    #[must_use]
    pub const fn join_type(&self) -> JoinType {
        self.join_type
    }

    /// Returns the join predicate.
    #[must_use]
    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    fn pair_matches(&self, left: &Tuple, right: &Tuple) -> QueryResult<bool> {
        let Some(predicate) = &self.predicate else {
            return Ok(true);
        };
        let mut env = Environment::new();
        env.add_tuple(&self.left_schema, left.values());
        env.add_tuple(&self.right_schema, right.values());
        predicate.evaluate_predicate(&env)
    }

    /// Moves to the next left tuple, or past the end of the left child.
    fn advance_left(&mut self) -> QueryResult<()> {
        self.left_tuple = None;
        self.break_inner = false;
        match self.left.next_tuple()? {
            Some(tuple) => {
                self.left_tuple = Some(tuple);
                self.right.initialize()?;
                self.right_ordinal = 0;
                self.state = JoinState::Scanning { matched: false };
            }
            None if self.join_type == JoinType::FullOuter => {
                self.right.initialize()?;
                self.right_ordinal = 0;
                self.state = JoinState::EmittingRightUnmatched;
            }
            None => self.state = JoinState::Exhausted,
        }
        Ok(())
    }

    /// Ends the current left tuple; the next call advances the left child.
    fn finish_left_row(&mut self) {
        self.state = JoinState::Scanning { matched: true };
        self.break_inner = true;
    }

    /// Pulls one right tuple for the current left tuple.
    fn scan_inner(&mut self, matched: bool) -> QueryResult<Option<Tuple>> {
        let Some(right) = self.right.next_tuple()? else {
            if self.inner_empty
                && matches!(self.join_type, JoinType::Inner | JoinType::Cross | JoinType::Semijoin)
            {
                self.left_tuple = None;
                self.state = JoinState::Exhausted;
            } else if !matched && self.join_type.preserves_left() {
                self.state = JoinState::EmittingNullPad;
            } else if !matched && self.join_type == JoinType::Antijoin {
                self.state = JoinState::EmittingUnmatched;
            } else {
                self.advance_left()?;
            }
            return Ok(None);
        };

        let ordinal = self.right_ordinal;
        self.right_ordinal += 1;
        self.inner_empty = false;
        if self.join_type == JoinType::FullOuter && self.matched_right.len() <= ordinal {
            self.matched_right.resize(ordinal + 1, false);
        }

        let Some(left) = self.left_tuple.as_ref() else {
            self.state = JoinState::Exhausted;
            return Ok(None);
        };
        if !self.pair_matches(left, &right)? {
            return Ok(None);
        }
        match self.join_type {
            JoinType::Inner | JoinType::Cross | JoinType::LeftOuter | JoinType::FullOuter => {
                let joined = left.concat(&right);
                if let Some(flag) = self.matched_right.get_mut(ordinal) {
                    *flag = true;
                }
                self.state = JoinState::Scanning { matched: true };
                Ok(Some(joined))
            }
            JoinType::Semijoin => {
                let row = left.detached();
                self.finish_left_row();
                Ok(Some(row))
            }
            JoinType::Antijoin => {
                self.finish_left_row();
                Ok(None)
            }
            JoinType::RightOuter => Err(right_outer_unsupported()),
        }
    }

    fn emit(&mut self, tuple: Tuple) -> QueryResult<Option<Tuple>> {
        self.base.inc_tuples_produced();
        if !self.swapped {
            return Ok(Some(tuple));
        }
        let mut values = tuple.into_values();
        let width = self.left_schema.len().min(values.len());
        values.rotate_left(width);
        Ok(Some(Tuple::new(values)))
    }
}

fn right_outer_unsupported() -> QueryError {
    QueryError::Configuration(
        "RIGHT OUTER joins run as LEFT OUTER joins with swapped children".to_string(),
    )
}

impl PlanNode for NestedLoopJoinNode {
    fn operation_type(&self) -> OperationType {
        OperationType::NestedLoopJoin
    }

    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        vec![self.left.as_mut(), self.right.as_mut()]
    }

    fn prepare(&mut self) -> QueryResult<()> {
        self.left.prepare()?;
        self.right.prepare()?;
        if self.join_type == JoinType::RightOuter {
            return Err(right_outer_unsupported());
        }
        if self.swapped && self.join_type.left_columns_only() {
            return Err(QueryError::Configuration(format!(
                "{} joins cannot swap their output",
                self.join_type
            )));
        }

        self.left_schema = self.left.schema();
        self.right_schema = self.right.schema();
        let combined = self.left_schema.concat(&self.right_schema);
        let mut combined_stats = self.left.column_stats().to_vec();
        combined_stats.extend_from_slice(self.right.column_stats());

        let config = self.base.config();
        let selectivity = match &self.predicate {
            Some(predicate) => {
                for name in predicate.columns() {
                    combined.column_index(name)?;
                }
                estimate_selectivity(predicate, &combined, &combined_stats, &config.selectivity)
            }
            None => 1.0,
        };
        let cost = config.cost_model.nested_loop(
            &self.left.cost().unwrap_or_default(),
            &self.right.cost().unwrap_or_default(),
            self.join_type,
            selectivity,
        );

        let left_width = self.left_schema.len();
        let (schema, stats) = if self.join_type.left_columns_only() {
            combined_stats.truncate(left_width);
            (self.left_schema.as_ref().clone(), combined_stats)
        } else if self.swapped {
            combined_stats.rotate_left(left_width);
            (self.right_schema.concat(&self.left_schema), combined_stats)
        } else {
            (combined, combined_stats)
        };
        self.base.set_prepared(schema, cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.left.initialize()?;
        self.right.initialize()?;
        self.state = JoinState::Start;
        self.left_tuple = None;
        self.break_inner = false;
        self.inner_empty = true;
        self.right_ordinal = 0;
        self.matched_right.clear();
        Ok(())
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        loop {
            match self.state {
                JoinState::Exhausted => return Ok(None),
                JoinState::Start => self.advance_left()?,
                JoinState::Scanning { .. } if self.break_inner => self.advance_left()?,
                JoinState::Scanning { matched } => {
                    if let Some(tuple) = self.scan_inner(matched)? {
                        return self.emit(tuple);
                    }
                }
                JoinState::EmittingNullPad => {
                    let padded = self.left_tuple.as_ref().map(|left| left.concat(&Tuple::nulls(self.right_schema.len())));
                    self.finish_left_row();
                    if let Some(tuple) = padded {
                        return self.emit(tuple);
                    }
                }
                JoinState::EmittingUnmatched => {
                    let row = self.left_tuple.as_ref().map(Tuple::detached);
                    self.finish_left_row();
                    if let Some(tuple) = row {
                        return self.emit(tuple);
                    }
                }
                JoinState::EmittingRightUnmatched => match self.right.next_tuple()? {
                    None => self.state = JoinState::Exhausted,
                    Some(right) => {
                        let ordinal = self.right_ordinal;
                        self.right_ordinal += 1;
                        if !self.matched_right.get(ordinal).copied().unwrap_or(false) {
                            return self.emit(Tuple::nulls(self.left_schema.len()).concat(&right));
                        }
                    }
                },
            }
        }
    }

    fn clean_up(&mut self) -> QueryResult<()> {
        self.left_tuple = None;
        self.matched_right = Vec::new();
        self.left.clean_up()?;
        self.right.clean_up()
    }

    fn supports_marking(&self) -> bool {
        self.left.supports_marking() && self.right.supports_marking()
    }

    fn mark_current_position(&mut self) -> QueryResult<()> {
        if !self.supports_marking() {
            return Err(marking_unsupported(self.operation_type()));
        }
        self.left.mark_current_position()?;
        self.right.mark_current_position()?;
        self.mark = Some(JoinMark {
            state: self.state,
            left_tuple: self.left_tuple.as_ref().map(Tuple::detached),
            break_inner: self.break_inner,
            inner_empty: self.inner_empty,
            right_ordinal: self.right_ordinal,
            matched_right: self.matched_right.clone(),
        });
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> QueryResult<()> {
        if !self.supports_marking() {
            return Err(marking_unsupported(self.operation_type()));
        }
        let mark = self.mark.clone().ok_or_else(|| no_mark(self.operation_type()))?;
        self.left.reset_to_last_mark()?;
        self.right.reset_to_last_mark()?;
        self.state = mark.state;
        self.left_tuple = mark.left_tuple;
        self.break_inner = mark.break_inner;
        self.inner_empty = mark.inner_empty;
        self.right_ordinal = mark.right_ordinal;
        self.matched_right = mark.matched_right;
        Ok(())
    }

    fn duplicate(&self) -> BoxedNode {
        let mut copy = Self::new(
            self.join_type,
            self.predicate.clone(),
            self.left.duplicate(),
            self.right.duplicate(),
        );
        copy.swapped = self.swapped;
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for NestedLoopJoinNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NestedLoopJoin[{}", self.join_type)?;
        if let Some(predicate) = &self.predicate {
            write!(f, ", pred: {predicate}")?;
        }
        if self.swapped {
            write!(f, ", swapped")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use burrowdb_core::Value;

    use super::*;
    use crate::exec::collect_tuples;
    use crate::exec::operators::{RenameNode, ValuesNode};

    fn table(name: &str, columns: [&str; 2], rows: &[(i64, i64)]) -> BoxedNode {
        let values = ValuesNode::with_columns(
            columns.iter().map(|c| (*c).to_string()).collect(),
            rows.iter().map(|&(x, y)| vec![Value::Int(x), Value::Int(y)]).collect(),
        );
        Box::new(RenameNode::new(name, Box::new(values)))
    }

    fn left() -> BoxedNode {
        table("l", ["a", "b"], &[(10, 1), (20, 2), (30, 3), (40, 4)])
    }

    fn right() -> BoxedNode {
        table("r", ["b", "c"], &[(1, 100), (2, 200), (3, 300), (5, 500)])
    }

    fn on_b() -> Option<Expr> {
        Some(Expr::qualified_column("l", "b").eq(Expr::qualified_column("r", "b")))
    }

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    fn run(mut node: NestedLoopJoinNode) -> Vec<Vec<Value>> {
        node.prepare().unwrap();
        collect_tuples(&mut node).unwrap().into_iter().map(Tuple::into_values).collect()
    }

    #[test]
    fn inner_join() {
        let rows = run(NestedLoopJoinNode::new(JoinType::Inner, on_b(), left(), right()));
        assert_eq!(
            rows,
            vec![
                vec![int(10), int(1), int(1), int(100)],
                vec![int(20), int(2), int(2), int(200)],
                vec![int(30), int(3), int(3), int(300)],
            ]
        );
    }

    #[test]
    fn cross_join_pairs_everything() {
        let mut node = NestedLoopJoinNode::new(JoinType::Cross, None, left(), right());
        node.prepare().unwrap();
        assert_eq!(node.schema().len(), 4);
        assert_eq!(collect_tuples(&mut node).unwrap().len(), 16);
    }

    #[test]
    fn left_outer_pads_unmatched_left() {
        let rows = run(NestedLoopJoinNode::new(JoinType::LeftOuter, on_b(), left(), right()));
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3], vec![int(40), int(4), Value::Null, Value::Null]);
    }

    #[test]
    fn full_outer_adds_unmatched_right() {
        let rows = run(NestedLoopJoinNode::new(JoinType::FullOuter, on_b(), left(), right()));
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[3], vec![int(40), int(4), Value::Null, Value::Null]);
        assert_eq!(rows[4], vec![Value::Null, Value::Null, int(5), int(500)]);
    }

    #[test]
    fn swapped_left_outer_is_right_outer() {
        let node = NestedLoopJoinNode::new(JoinType::LeftOuter, on_b(), right(), left()).swap_output();
        assert_eq!(node.to_string(), "NestedLoopJoin[LEFT OUTER, pred: l.b = r.b, swapped]");
        let mut node = node;
        node.prepare().unwrap();
        assert_eq!(node.schema().to_string(), "[l.a:BIGINT, l.b:BIGINT, r.b:BIGINT, r.c:BIGINT]");
        let rows: Vec<_> = collect_tuples(&mut node).unwrap().into_iter().map(Tuple::into_values).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![int(10), int(1), int(1), int(100)]);
        assert_eq!(rows[3], vec![Value::Null, Value::Null, int(5), int(500)]);
    }

    #[test]
    fn semijoin_and_antijoin_emit_left_only() {
        let semi = run(NestedLoopJoinNode::new(JoinType::Semijoin, on_b(), left(), right()));
        assert_eq!(semi, vec![vec![int(10), int(1)], vec![int(20), int(2)], vec![int(30), int(3)]]);
        let anti = run(NestedLoopJoinNode::new(JoinType::Antijoin, on_b(), left(), right()));
        assert_eq!(anti, vec![vec![int(40), int(4)]]);
    }

    #[test]
    fn semijoin_emits_each_left_row_once() {
        let dupes = table("r", ["b", "c"], &[(1, 1), (1, 2), (1, 3)]);
        let rows = run(NestedLoopJoinNode::new(JoinType::Semijoin, on_b(), left(), dupes));
        assert_eq!(rows, vec![vec![int(10), int(1)]]);
    }

    #[test]
    fn empty_inputs() {
        let empty_right = || table("r", ["b", "c"], &[]);
        let empty_left = || table("l", ["a", "b"], &[]);
        assert!(run(NestedLoopJoinNode::new(JoinType::Inner, on_b(), left(), empty_right())).is_empty());
        assert!(run(NestedLoopJoinNode::new(JoinType::Semijoin, on_b(), left(), empty_right())).is_empty());
        assert_eq!(run(NestedLoopJoinNode::new(JoinType::LeftOuter, on_b(), left(), empty_right())).len(), 4);
        assert_eq!(run(NestedLoopJoinNode::new(JoinType::Antijoin, on_b(), left(), empty_right())).len(), 4);
        assert!(run(NestedLoopJoinNode::new(JoinType::Inner, on_b(), empty_left(), right())).is_empty());
        assert!(run(NestedLoopJoinNode::new(JoinType::LeftOuter, on_b(), empty_left(), right())).is_empty());
        assert_eq!(run(NestedLoopJoinNode::new(JoinType::FullOuter, on_b(), empty_left(), right())).len(), 4);
    }

    #[test]
    fn right_outer_is_rejected() {
        let mut node = NestedLoopJoinNode::new(JoinType::RightOuter, on_b(), left(), right());
        assert!(matches!(node.prepare(), Err(QueryError::Configuration(_))));
    }

    #[test]
    fn children_need_no_marking() {
        for join_type in [JoinType::Inner, JoinType::Cross, JoinType::LeftOuter, JoinType::FullOuter, JoinType::Semijoin, JoinType::Antijoin] {
            let node = NestedLoopJoinNode::new(join_type, on_b(), left(), right());
            assert!(!node.requires_left_marking(), "{join_type:?}");
            assert!(!node.requires_right_marking(), "{join_type:?}");
        }
    }

    #[test]
    fn restart_after_exhaustion() {
        let mut node = NestedLoopJoinNode::new(JoinType::Inner, on_b(), left(), right());
        node.prepare().unwrap();
        assert_eq!(collect_tuples(&mut node).unwrap().len(), 3);
        assert!(node.next_tuple().unwrap().is_none());
        assert_eq!(collect_tuples(&mut node).unwrap().len(), 3);
    }

    #[test]
    fn mark_and_reset_replays_output() {
        let mut node = NestedLoopJoinNode::new(JoinType::LeftOuter, on_b(), left(), right());
        node.prepare().unwrap();
        assert!(node.supports_marking());
        node.initialize().unwrap();
        node.next_tuple().unwrap();
        node.mark_current_position().unwrap();
        let rest: Vec<_> = std::iter::from_fn(|| node.next_tuple().unwrap()).collect();
        assert_eq!(rest.len(), 3);
        node.reset_to_last_mark().unwrap();
        let replay: Vec<_> = std::iter::from_fn(|| node.next_tuple().unwrap()).collect();
        assert_eq!(replay, rest);
    }

    #[test]
    fn cost_uses_predicate_selectivity() {
        let mut node = NestedLoopJoinNode::new(JoinType::Inner, on_b(), left(), right());
        node.prepare().unwrap();
        let cost = node.cost().unwrap();
        // 16 pairs, four distinct values on each side
        assert!((cost.num_tuples - 4.0).abs() < 1e-4);
        assert_eq!(cost.tuple_size, 32.0);
    }

    #[test]
    fn duplicate_rebuilds_an_unprepared_tree() {
        let node = NestedLoopJoinNode::new(JoinType::FullOuter, on_b(), left(), right());
        let mut copy = node.duplicate();
        assert!(!copy.base().is_prepared());
        copy.prepare().unwrap();
        assert_eq!(collect_tuples(copy.as_mut()).unwrap().len(), 5);
    }
}
