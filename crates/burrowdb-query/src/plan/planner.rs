//! Rule-based plan construction.
//!
//! A `SELECT` is planned as a fixed pipeline over its `FROM` clause:
//!
//! ```text
//! from -> WHERE -> grouping/aggregation -> HAVING -> ORDER BY -> projection -> LIMIT
//! ```
//!
//! ORDER BY runs after the projection when a key names a select-list alias
//! that renames something else, since the alias shadows any base column of
//! the same name. Otherwise it runs before the projection when its keys
//! resolve against the unprojected rows, so unprojected columns can be
//! sort keys. Every returned plan is prepared.

use tracing::{debug, warn};

use crate::ast::{FromClause, JoinCondition, JoinType, OrderByExpr, SelectClause, SelectValue};
use crate::error::{QueryError, QueryResult};
use crate::exec::operators::{
    FileScanNode, FilterNode, HashedGroupAggregateNode, LimitNode, NestedLoopJoinNode, ProjectNode,
    RenameNode, SortNode, ValuesNode,
};
use crate::exec::{BoxedNode, PlanNode, Schema};
use crate::expr::{ColumnName, Expr, ExprProcessor, ScalarFunction};
use crate::plan::{AggregateReplacer, CostModel, SelectivityConfig};
use crate::storage::TableCatalog;

/// Configuration shared by every node of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlannerConfig {
    /// Selectivity estimator settings.
    pub selectivity: SelectivityConfig,
    /// Cost formulas.
    pub cost_model: CostModel,
}

impl PlannerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self { selectivity: SelectivityConfig::new(), cost_model: CostModel::new() }
    }

    /// Sets the selectivity estimator settings.
    #[must_use]
    pub const fn with_selectivity(mut self, selectivity: SelectivityConfig) -> Self {
        self.selectivity = selectivity;
        self
    }

    /// Sets the cost model.
    #[must_use]
    pub const fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }
}

/// Builds prepared plan trees for parsed statements.
///
/// ```
/// use burrowdb_core::{SqlType, Value};
/// use burrowdb_query::ast::{FromClause, SelectClause};
/// use burrowdb_query::exec::collect_tuples;
/// use burrowdb_query::plan::{Planner, PlannerConfig};
/// use burrowdb_query::storage::MemoryStorage;
///
/// let storage = MemoryStorage::new();
/// storage.create_table("t", &[("a", SqlType::Integer)]).unwrap();
/// storage.insert("t", vec![Value::Int(1)]).unwrap();
///
/// let planner = Planner::new(&storage, PlannerConfig::new());
/// let mut plan = planner.make_plan(&SelectClause::select_all(FromClause::table("t")), &[]).unwrap();
/// assert_eq!(collect_tuples(plan.as_mut()).unwrap().len(), 1);
/// ```
pub struct Planner<'a> {
    catalog: &'a dyn TableCatalog,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    /// Creates a planner reading tables from `catalog`.
    #[must_use]
    pub fn new(catalog: &'a dyn TableCatalog, config: PlannerConfig) -> Self {
        Self { catalog, config }
    }

    /// Returns the configuration applied to every planned node.
    #[must_use]
    pub const fn config(&self) -> PlannerConfig {
        self.config
    }

    /// Plans a `SELECT`.
    ///
    /// `enclosing` lists the statements this one is nested in; correlated
    /// subqueries are not supported, so it must be empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedFeature`] for correlated subqueries,
    /// [`QueryError::IllegalAggregatePlacement`] for aggregates in WHERE, ON
    /// or GROUP BY, storage errors for unknown tables, and evaluation errors
    /// for unresolvable columns.
    pub fn make_plan(&self, select: &SelectClause, enclosing: &[SelectClause]) -> QueryResult<BoxedNode> {
        if !enclosing.is_empty() {
            warn!(depth = enclosing.len(), "correlated subquery rejected");
            return Err(QueryError::UnsupportedFeature(
                "correlated subqueries are not supported".to_string(),
            ));
        }

        let mut plan: BoxedNode = match &select.from {
            Some(from) => self.plan_from(from)?,
            None => self.finish(Box::new(ValuesNode::single_empty_row()))?,
        };

        if let Some(predicate) = &select.where_expr {
            let mut checker = AggregateReplacer::new();
            checker.disallow("the WHERE clause");
            let predicate = checker.replace(predicate.clone())?;
            plan = self.finish(Box::new(FilterNode::new(predicate, plan)))?;
        }

        let mut select_values = select.select_values.clone();
        let mut having = select.having.clone();
        let mut order_by = select.order_by.clone();

        let mut checker = AggregateReplacer::new();
        checker.disallow("the GROUP BY clause");
        for expr in &select.group_by {
            checker.replace(expr.clone())?;
        }

        let mut replacer = AggregateReplacer::new();
        for value in &mut select_values {
            if let SelectValue::Expr { expr, .. } = value {
                *expr = replacer.replace(expr.clone())?;
            }
        }
        if let Some(predicate) = having.take() {
            having = Some(replacer.replace(predicate)?);
        }
        for key in &mut order_by {
            key.expr = replacer.replace(key.expr.clone())?;
        }
        let aggregates = replacer.into_aggregates();

        if !select.group_by.is_empty() || !aggregates.is_empty() {
            debug!(group_by = select.group_by.len(), aggregates = aggregates.len(), "planning grouping");
            plan = self.finish(Box::new(HashedGroupAggregateNode::new(
                select.group_by.clone(),
                aggregates,
                plan,
            )))?;
            let mut grouped = GroupExprReplacer { group_by: &select.group_by };
            for value in &mut select_values {
                if let SelectValue::Expr { expr, .. } = value {
                    *expr = expr.clone().traverse(&mut grouped)?;
                }
            }
            if let Some(predicate) = having.take() {
                having = Some(predicate.traverse(&mut grouped)?);
            }
            for key in &mut order_by {
                key.expr = key.expr.clone().traverse(&mut grouped)?;
            }
        }

        if let Some(predicate) = having {
            plan = self.finish(Box::new(FilterNode::new(predicate, plan)))?;
        }

        let key_columns = order_by_columns(&order_by);
        let sort_first = !order_by.is_empty()
            && !names_shadowing_alias(&key_columns, &select.select_values)
            && resolves_all(&key_columns, &plan.schema());
        if sort_first {
            debug!(keys = order_by.len(), "sorting before projection");
            plan = self.finish(Box::new(SortNode::new(order_by.clone(), plan)))?;
        }

        if select.is_trivial_projection() {
            debug!("skipping trivial projection");
        } else {
            plan = self.finish(Box::new(ProjectNode::new(select_values, plan)))?;
        }

        if !order_by.is_empty() && !sort_first {
            debug!(keys = order_by.len(), "sorting after projection");
            plan = self.finish(Box::new(SortNode::new(order_by, plan)))?;
        }

        if select.limit.is_some() || select.offset > 0 {
            plan = self.finish(Box::new(LimitNode::new(select.limit, select.offset, plan)))?;
        }
        Ok(plan)
    }

    /// Plans a scan of one table with an optional predicate.
    ///
    /// Tuples produced by the scan carry their storage location, so callers
    /// can update or delete them in place. A non-empty `enclosing` is
    /// tolerated here but logged, since the predicate cannot see outer rows.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] for an empty table name, a
    /// storage error for an unknown table, and
    /// [`QueryError::IllegalAggregatePlacement`] for aggregates in the predicate.
    pub fn make_simple_select(
        &self,
        table: &str,
        predicate: Option<Expr>,
        enclosing: &[SelectClause],
    ) -> QueryResult<FileScanNode> {
        if table.is_empty() {
            return Err(QueryError::InvalidArgument("table name must not be empty".to_string()));
        }
        if !enclosing.is_empty() {
            warn!(table, depth = enclosing.len(), "enclosing statements ignored for simple select");
        }
        let predicate = match predicate {
            Some(predicate) => {
                let mut checker = AggregateReplacer::new();
                checker.disallow("the WHERE clause");
                Some(checker.replace(predicate)?)
            }
            None => None,
        };
        let info = self.catalog.open_table(table)?;
        debug!(table, rows = info.stats.num_tuples, "planning file scan");
        let mut node = FileScanNode::new(info, predicate);
        node.configure(self.config);
        node.prepare()?;
        Ok(node)
    }

    fn plan_from(&self, from: &FromClause) -> QueryResult<BoxedNode> {
        match from {
            FromClause::BaseTable { table, alias } => {
                let scan: BoxedNode = Box::new(self.make_simple_select(table, None, &[])?);
                match alias {
                    Some(alias) if alias != table => {
                        self.finish(Box::new(RenameNode::new(alias.clone(), scan)))
                    }
                    _ => Ok(scan),
                }
            }
            FromClause::Subquery { select, alias } => {
                let plan = self.make_plan(select, &[])?;
                self.finish(Box::new(RenameNode::new(alias.clone(), plan)))
            }
            FromClause::Join { left, right, join_type, condition } => {
                self.plan_join(left, right, *join_type, condition)
            }
        }
    }

    fn plan_join(
        &self,
        left: &FromClause,
        right: &FromClause,
        join_type: JoinType,
        condition: &JoinCondition,
    ) -> QueryResult<BoxedNode> {
        let left = self.plan_from(left)?;
        let right = self.plan_from(right)?;
        let (left_schema, right_schema) = (left.schema(), right.schema());

        let (predicate, shared) = match condition {
            JoinCondition::None => (None, Vec::new()),
            JoinCondition::On(predicate) => {
                let mut checker = AggregateReplacer::new();
                checker.disallow("the ON clause");
                (Some(checker.replace(predicate.clone())?), Vec::new())
            }
            JoinCondition::Using(columns) => {
                (shared_columns_predicate(columns, &left_schema, &right_schema)?, columns.clone())
            }
            JoinCondition::Natural => {
                let columns = left_schema.common_column_names(&right_schema);
                if columns.is_empty() {
                    debug!("natural join without common columns");
                }
                (shared_columns_predicate(&columns, &left_schema, &right_schema)?, columns)
            }
        };
        debug!(%join_type, shared = shared.len(), "planning nested-loops join");

        let join = if join_type == JoinType::RightOuter {
            NestedLoopJoinNode::new(JoinType::LeftOuter, predicate, right, left).swap_output()
        } else {
            NestedLoopJoinNode::new(join_type, predicate, left, right)
        };
        let plan = self.finish(Box::new(join))?;
        if shared.is_empty() {
            return Ok(plan);
        }
        let projection = shared_columns_projection(&shared, &left_schema, &right_schema, join_type)?;
        self.finish(Box::new(ProjectNode::new(projection, plan)))
    }

    fn finish(&self, mut node: BoxedNode) -> QueryResult<BoxedNode> {
        node.configure(self.config);
        node.prepare()?;
        Ok(node)
    }
}

/// Resolves `column` to a single column of `schema`, as a qualified reference.
fn shared_column(column: &str, schema: &Schema, side: &str) -> QueryResult<ColumnName> {
    match schema.find_columns(&ColumnName::new(column)).as_slice() {
        [index] => schema
            .column_info(*index)
            .map(|c| c.column_name())
            .ok_or_else(|| QueryError::invalid_state(format!("column {index} out of range"))),
        [] => Err(QueryError::InvalidArgument(format!(
            "join column {column} does not exist in the {side} input"
        ))),
        _ => Err(QueryError::InvalidArgument(format!(
            "join column {column} is ambiguous in the {side} input"
        ))),
    }
}

/// `left.c = right.c AND ...` over the shared columns; `None` when there are none.
fn shared_columns_predicate(columns: &[String], left: &Schema, right: &Schema) -> QueryResult<Option<Expr>> {
    let terms = columns
        .iter()
        .map(|c| {
            let l = shared_column(c, left, "left")?;
            let r = shared_column(c, right, "right")?;
            Ok(Expr::Column(l).eq(Expr::Column(r)))
        })
        .collect::<QueryResult<Vec<_>>>()?;
    Ok(Expr::conjunction(terms))
}

/// Shared columns once, then the remaining left and right columns.
fn shared_columns_projection(
    columns: &[String],
    left: &Schema,
    right: &Schema,
    join_type: JoinType,
) -> QueryResult<Vec<SelectValue>> {
    let mut values = Vec::new();
    for column in columns {
        let l = Expr::Column(shared_column(column, left, "left")?);
        let r = Expr::Column(shared_column(column, right, "right")?);
        values.push(match join_type {
            JoinType::FullOuter => {
                SelectValue::aliased(Expr::function(ScalarFunction::Coalesce, vec![l, r]), column.clone())
            }
            JoinType::RightOuter => SelectValue::expr(r),
            _ => SelectValue::expr(l),
        });
    }
    let remaining = |schema: &Schema| -> Vec<SelectValue> {
        schema
            .columns()
            .iter()
            .filter(|c| !columns.contains(&c.name))
            .map(|c| SelectValue::expr(Expr::Column(c.column_name())))
            .collect()
    };
    values.extend(remaining(left));
    if !join_type.left_columns_only() {
        values.extend(remaining(right));
    }
    Ok(values)
}

fn order_by_columns(order_by: &[OrderByExpr]) -> Vec<ColumnName> {
    order_by.iter().flat_map(|k| k.expr.columns().into_iter().cloned()).collect()
}

/// Whether any unqualified column names an alias bound to something other
/// than the same bare column.
fn names_shadowing_alias(columns: &[ColumnName], select_values: &[SelectValue]) -> bool {
    columns.iter().filter(|c| c.table.is_none()).any(|c| {
        select_values.iter().any(|value| match value {
            SelectValue::Expr { expr, alias: Some(alias) } if *alias == c.column => {
                !matches!(expr.as_column(), Some(inner) if inner == c)
            }
            _ => false,
        })
    })
}

fn resolves_all(columns: &[ColumnName], schema: &Schema) -> bool {
    columns.iter().all(|c| schema.column_index(c).is_ok())
}

/// Replaces GROUP BY expressions with references to the grouping node's columns.
struct GroupExprReplacer<'a> {
    group_by: &'a [Expr],
}

impl ExprProcessor for GroupExprReplacer<'_> {
    fn enter(&mut self, _expr: &Expr) -> QueryResult<()> {
        Ok(())
    }

    fn leave(&mut self, expr: Expr) -> QueryResult<Expr> {
        if expr.as_column().is_none() && self.group_by.contains(&expr) {
            return Ok(Expr::Column(ColumnName::new(expr.to_string())));
        }
        Ok(expr)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use burrowdb_core::{SqlType, Value};

    use super::*;
    use crate::exec::collect_tuples;
    use crate::expr::AggregateFunction;
    use crate::storage::MemoryStorage;

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.create_table("t", &[("a", SqlType::Integer), ("b", SqlType::Integer)]).unwrap();
        for (a, b) in [(1, 10), (2, 20), (3, 10)] {
            storage.insert("t", vec![Value::Int(a), Value::Int(b)]).unwrap();
        }
        storage.analyze("t").unwrap();
        storage
    }

    fn rows(planner: &Planner<'_>, select: &SelectClause) -> Vec<Vec<Value>> {
        let mut plan = planner.make_plan(select, &[]).unwrap();
        collect_tuples(plan.as_mut()).unwrap().into_iter().map(|t| t.into_values()).collect()
    }

    #[test]
    fn select_without_from() {
        let storage = storage();
        let planner = Planner::new(&storage, PlannerConfig::new());
        let select = SelectClause::new(vec![SelectValue::aliased(Expr::literal(1).add(Expr::literal(1)), "two")]);
        assert_eq!(rows(&planner, &select), vec![vec![Value::Int(2)]]);
    }

    #[test]
    fn group_by_expression_is_reused_in_select_list() {
        let storage = storage();
        let planner = Planner::new(&storage, PlannerConfig::new());
        let key = Expr::column("b").div(Expr::literal(10));
        let select = SelectClause::new(vec![
            SelectValue::expr(key.clone().mul(Expr::literal(100))),
            SelectValue::expr(Expr::count_star()),
        ])
        .from(FromClause::table("t"))
        .group_by(vec![key]);
        assert_eq!(
            rows(&planner, &select),
            vec![vec![Value::Int(100), Value::Int(2)], vec![Value::Int(200), Value::Int(1)]]
        );
    }

    #[test]
    fn aggregates_in_where_and_group_by_are_rejected() {
        let storage = storage();
        let planner = Planner::new(&storage, PlannerConfig::new());
        let sum = Expr::aggregate(AggregateFunction::Sum, Expr::column("a"), false);

        let in_where = SelectClause::select_all(FromClause::table("t")).where_clause(sum.clone().gt(Expr::literal(1)));
        let err = planner.make_plan(&in_where, &[]).err().unwrap();
        assert!(matches!(err, QueryError::IllegalAggregatePlacement(_)));
        assert!(err.to_string().contains("WHERE"));

        let in_group = SelectClause::new(vec![SelectValue::expr(Expr::count_star())])
            .from(FromClause::table("t"))
            .group_by(vec![sum]);
        let err = planner.make_plan(&in_group, &[]).err().unwrap();
        assert!(err.to_string().contains("GROUP BY"));
    }

    #[test]
    fn correlated_subqueries_are_unsupported() {
        let storage = storage();
        let planner = Planner::new(&storage, PlannerConfig::new());
        let outer = SelectClause::select_all(FromClause::table("t"));
        let err = planner.make_plan(&outer, std::slice::from_ref(&outer)).err().unwrap();
        assert!(matches!(err, QueryError::UnsupportedFeature(_)));
    }

    #[test]
    fn simple_select_validates_table_name() {
        let storage = storage();
        let planner = Planner::new(&storage, PlannerConfig::new());
        assert!(matches!(planner.make_simple_select("", None, &[]), Err(QueryError::InvalidArgument(_))));
        assert!(matches!(planner.make_simple_select("missing", None, &[]), Err(QueryError::Storage(_))));

        let outer = SelectClause::select_all(FromClause::table("t"));
        let scan = planner.make_simple_select("t", Some(Expr::column("b").eq(Expr::literal(10))), &[outer]).unwrap();
        assert!(scan.base().is_prepared());
        assert_eq!(scan.cost().unwrap().num_tuples, 1.5);
    }

    #[test]
    fn configuration_reaches_every_node() {
        let storage = storage();
        let config = PlannerConfig::new().with_selectivity(SelectivityConfig::new().with_default_selectivity(0.5));
        let planner = Planner::new(&storage, config);
        let select = SelectClause::select_all(FromClause::table("t")).where_clause(Expr::column("a").lt(Expr::column("b")));
        let plan = planner.make_plan(&select, &[]).unwrap();
        assert_eq!(plan.base().config(), config);
        assert_eq!(plan.cost().unwrap().num_tuples, 1.5);
    }
}
