//! The plan node trait and the state shared by every node.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::ast::OrderByExpr;
use crate::error::{QueryError, QueryResult};
use crate::exec::{Schema, Tuple};
use crate::plan::{ColumnStats, PlanCost, PlannerConfig};

/// The kind of operation a plan node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Sequential table scan.
    FileScan,
    /// Predicate filter over a child.
    Select,
    /// Projection.
    Project,
    /// Table-alias rebinding.
    Rename,
    /// In-memory sort.
    Sort,
    /// LIMIT / OFFSET.
    Limit,
    /// Hash-based grouping and aggregation.
    GroupAggregate,
    /// Nested-loops join.
    NestedLoopJoin,
    /// Literal rows.
    Values,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileScan => "FileScan",
            Self::Select => "Select",
            Self::Project => "Project",
            Self::Rename => "Rename",
            Self::Sort => "Sort",
            Self::Limit => "Limit",
            Self::GroupAggregate => "HashedGroupAggregate",
            Self::NestedLoopJoin => "NestedLoopJoin",
            Self::Values => "Values",
        })
    }
}

/// Schema, cost and statistics computed by `prepare()`, plus run counters.
#[derive(Debug, Clone, Default)]
pub struct NodeBase {
    schema: Arc<Schema>,
    cost: Option<PlanCost>,
    column_stats: Vec<ColumnStats>,
    config: PlannerConfig,
    prepared: bool,
    tuples_produced: u64,
}

impl NodeBase {
    /// Creates an unprepared base with the default planner configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unprepared base that keeps this base's configuration.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self { config: self.config, ..Self::default() }
    }

    /// Returns the output schema (empty before `prepare()`).
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Returns the estimated cost, if prepared.
    #[must_use]
    pub fn cost(&self) -> Option<PlanCost> {
        self.cost
    }

    /// Returns per-column statistics for the output.
    #[must_use]
    pub fn column_stats(&self) -> &[ColumnStats] {
        &self.column_stats
    }

    /// Returns the planner configuration used for estimates.
    #[must_use]
    pub const fn config(&self) -> PlannerConfig {
        self.config
    }

    /// Replaces the planner configuration.
    pub fn set_config(&mut self, config: PlannerConfig) {
        self.config = config;
    }

    /// Records the results of `prepare()`.
    pub fn set_prepared(&mut self, schema: Schema, cost: PlanCost, column_stats: Vec<ColumnStats>) {
        self.schema = Arc::new(schema);
        self.cost = Some(cost);
        self.column_stats = column_stats;
        self.prepared = true;
    }

    /// Returns true once `prepare()` has run.
    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Fails unless `prepare()` has run.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidState`] for an unprepared node.
    pub fn ensure_prepared(&self, op: OperationType) -> QueryResult<()> {
        if self.prepared {
            Ok(())
        } else {
            Err(QueryError::invalid_state(format!("{op} node used before prepare()")))
        }
    }

    /// Counts one produced tuple.
    pub fn inc_tuples_produced(&mut self) {
        self.tuples_produced += 1;
    }

    /// Resets the produced-tuple counter.
    pub fn reset_tuples_produced(&mut self) {
        self.tuples_produced = 0;
    }

    /// Returns the number of tuples produced since the last `initialize()`.
    #[must_use]
    pub const fn tuples_produced(&self) -> u64 {
        self.tuples_produced
    }
}

/// A pull-based query operator.
///
/// Lifecycle: construct, [`prepare`](Self::prepare) once, then any number of
/// rounds of [`initialize`](Self::initialize) followed by
/// [`next_tuple`](Self::next_tuple) until it returns `None`, and finally
/// [`clean_up`](Self::clean_up). Once `next_tuple` returns `None` it keeps
/// doing so until the next `initialize`.
///
/// A returned tuple may hold a page pin; consumers release it (by dropping
/// the tuple or calling [`Tuple::unpin`]) before asking for the next one.
pub trait PlanNode: fmt::Display + Send {
    /// The kind of operation this node performs.
    fn operation_type(&self) -> OperationType;

    /// Shared node state.
    fn base(&self) -> &NodeBase;

    /// Mutable shared node state.
    fn base_mut(&mut self) -> &mut NodeBase;

    /// Child nodes, left to right.
    fn children(&self) -> Vec<&dyn PlanNode> {
        Vec::new()
    }

    /// Mutable child nodes, left to right.
    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        Vec::new()
    }

    /// Computes the output schema, cost and statistics, preparing children first.
    ///
    /// # Errors
    ///
    /// Returns an error if the node configuration is invalid for its inputs.
    fn prepare(&mut self) -> QueryResult<()>;

    /// Resets iteration state so the node produces its results from the start.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidState`] before `prepare()`, or a child's error.
    fn initialize(&mut self) -> QueryResult<()>;

    /// Returns the next tuple, or `None` when exhausted.
    ///
    /// # Errors
    ///
    /// Returns evaluation or storage errors.
    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>>;

    /// Releases resources held by this subtree. A later `initialize()` is allowed.
    ///
    /// # Errors
    ///
    /// Returns the first child error.
    fn clean_up(&mut self) -> QueryResult<()> {
        for child in self.children_mut() {
            child.clean_up()?;
        }
        Ok(())
    }

    /// Whether [`mark_current_position`](Self::mark_current_position) is available.
    fn supports_marking(&self) -> bool;

    /// Whether this node needs its left child to support marking.
    fn requires_left_marking(&self) -> bool {
        false
    }

    /// Whether this node needs its right child to support marking.
    fn requires_right_marking(&self) -> bool {
        false
    }

    /// Remembers the current position so it can be replayed.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidState`] if marking is unsupported.
    fn mark_current_position(&mut self) -> QueryResult<()>;

    /// Rewinds to the last marked position.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidState`] if no mark is set or marking is unsupported.
    fn reset_to_last_mark(&mut self) -> QueryResult<()>;

    /// The ordering of this node's output, if it has one.
    fn results_ordered_by(&self) -> Vec<OrderByExpr> {
        Vec::new()
    }

    /// Rebuilds this subtree from its configuration. The copy is unprepared.
    fn duplicate(&self) -> BoxedNode;

    /// Output schema (empty before `prepare()`).
    fn schema(&self) -> Arc<Schema> {
        self.base().schema()
    }

    /// Estimated cost, available after `prepare()`.
    fn cost(&self) -> Option<PlanCost> {
        self.base().cost()
    }

    /// Per-column statistics for the output, available after `prepare()`.
    fn column_stats(&self) -> &[ColumnStats] {
        self.base().column_stats()
    }

    /// Applies a planner configuration to this subtree.
    fn configure(&mut self, config: PlannerConfig) {
        self.base_mut().set_config(config);
        for child in self.children_mut() {
            child.configure(config);
        }
    }
}

/// A boxed plan node.
pub type BoxedNode = Box<dyn PlanNode>;

/// Builds the error returned by nodes that cannot mark.
pub(crate) fn marking_unsupported(op: OperationType) -> QueryError {
    QueryError::invalid_state(format!("{op} node does not support marking"))
}

/// Builds the error returned when resetting without a mark.
pub(crate) fn no_mark(op: OperationType) -> QueryError {
    QueryError::invalid_state(format!("{op} node has no marked position"))
}

/// Renders a plan tree, one node per line, with cost annotations.
#[must_use]
pub fn explain(node: &dyn PlanNode) -> String {
    let mut out = String::new();
    explain_into(node, 0, &mut out);
    out
}

fn explain_into(node: &dyn PlanNode, depth: usize, out: &mut String) {
    let _ = write!(out, "{:indent$}{node}", "", indent = depth * 2);
    if let Some(cost) = node.cost() {
        let _ = write!(out, " cost={cost}");
    }
    out.push('\n');
    for child in node.children() {
        explain_into(child, depth + 1, out);
    }
}
