//! Replacement of aggregate calls by computed columns.
//!
//! The grouping node computes each distinct aggregate once and exposes it
//! as a column named `#` followed by the aggregate's display text. This pass
//! rewrites the select list and `HAVING` clause to refer to those columns,
//! collecting the aggregates the grouping node must compute.

use std::collections::BTreeMap;

use crate::error::{QueryError, QueryResult};
use crate::expr::{ColumnName, Expr, ExprProcessor};

/// Aggregates to compute, keyed by their synthetic column name.
pub type GroupAggregates = BTreeMap<String, Expr>;

/// Returns the synthetic column name for an aggregate call.
#[must_use]
pub fn aggregate_key(aggregate: &Expr) -> String {
    format!("#{aggregate}")
}

/// Returns true if `expr` contains an aggregate call anywhere.
#[must_use]
pub fn contains_aggregate(expr: &Expr) -> bool {
    expr.any(&mut Expr::is_aggregate)
}

/// Rewrites aggregate calls into column references.
///
/// ```
/// use burrowdb_query::expr::{AggregateFunction, Expr};
/// use burrowdb_query::plan::AggregateReplacer;
///
/// let mut replacer = AggregateReplacer::new();
/// let sum = Expr::aggregate(AggregateFunction::Sum, Expr::column("a"), false);
/// let rewritten = replacer.replace(sum.clone().add(Expr::literal(1))).unwrap();
/// assert_eq!(rewritten.to_string(), "#SUM(a) + 1");
/// assert_eq!(replacer.aggregates().get("#SUM(a)"), Some(&sum));
/// ```
#[derive(Debug, Default)]
pub struct AggregateReplacer {
    aggregates: GroupAggregates,
    disallowed_in: Option<String>,
    depth: usize,
}

impl AggregateReplacer {
    /// Creates a replacer with no collected aggregates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects aggregates in subsequent traversals, naming `clause` in the error.
    pub fn disallow(&mut self, clause: impl Into<String>) {
        self.disallowed_in = Some(clause.into());
    }

    /// Accepts aggregates in subsequent traversals.
    pub fn allow(&mut self) {
        self.disallowed_in = None;
    }

    /// Rewrites every aggregate call in `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::IllegalAggregatePlacement`] for aggregates while
    /// disallowed and for aggregates nested inside other aggregates.
    pub fn replace(&mut self, expr: Expr) -> QueryResult<Expr> {
        self.depth = 0;
        expr.traverse(self)
    }

    /// The aggregates collected so far.
    #[must_use]
    pub const fn aggregates(&self) -> &GroupAggregates {
        &self.aggregates
    }

    /// Consumes the replacer, returning the collected aggregates.
    #[must_use]
    pub fn into_aggregates(self) -> GroupAggregates {
        self.aggregates
    }
}

impl ExprProcessor for AggregateReplacer {
    fn enter(&mut self, expr: &Expr) -> QueryResult<()> {
        if !expr.is_aggregate() {
            return Ok(());
        }
        if let Some(clause) = &self.disallowed_in {
            return Err(QueryError::IllegalAggregatePlacement(format!(
                "aggregate functions are not allowed in {clause}: {expr}"
            )));
        }
        if self.depth > 0 {
            return Err(QueryError::IllegalAggregatePlacement(format!(
                "nested aggregate function {expr}"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self, expr: Expr) -> QueryResult<Expr> {
        if !expr.is_aggregate() {
            return Ok(expr);
        }
        self.depth -= 1;
        let key = aggregate_key(&expr);
        self.aggregates.entry(key.clone()).or_insert(expr);
        Ok(Expr::Column(ColumnName::new(key)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::expr::AggregateFunction;

    fn sum_a() -> Expr {
        Expr::aggregate(AggregateFunction::Sum, Expr::column("a"), false)
    }

    #[test]
    fn identical_aggregates_share_a_column() {
        let mut replacer = AggregateReplacer::new();
        let first = replacer.replace(sum_a()).unwrap();
        let second = replacer.replace(sum_a().gt(Expr::literal(3))).unwrap();
        assert_eq!(first, Expr::column("#SUM(a)"));
        assert_eq!(second.to_string(), "#SUM(a) > 3");
        assert_eq!(replacer.aggregates().len(), 1);
    }

    #[test]
    fn distinct_aggregates_get_distinct_keys() {
        let mut replacer = AggregateReplacer::new();
        replacer.replace(Expr::count_star()).unwrap();
        replacer.replace(Expr::aggregate(AggregateFunction::Count, Expr::column("a"), true)).unwrap();
        let keys: Vec<_> = replacer.into_aggregates().into_keys().collect();
        assert_eq!(keys, vec!["#COUNT(*)".to_string(), "#COUNT(DISTINCT a)".to_string()]);
    }

    #[test]
    fn disallowed_clause_is_named() {
        let mut replacer = AggregateReplacer::new();
        replacer.disallow("the WHERE clause");
        let err = replacer.replace(sum_a().gt(Expr::literal(1))).unwrap_err();
        assert!(matches!(err, QueryError::IllegalAggregatePlacement(_)));
        assert!(err.to_string().contains("WHERE"));
        assert!(replacer.aggregates().is_empty());

        replacer.allow();
        assert!(replacer.replace(sum_a()).is_ok());
    }

    #[test]
    fn nested_aggregates_are_rejected() {
        let nested = Expr::aggregate(AggregateFunction::Max, sum_a(), false);
        let err = AggregateReplacer::new().replace(nested).unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn expressions_without_aggregates_are_untouched() {
        let expr = Expr::column("a").add(Expr::literal(1));
        assert_eq!(AggregateReplacer::new().replace(expr.clone()).unwrap(), expr);
        assert!(!contains_aggregate(&expr));
        assert!(contains_aggregate(&expr.mul(Expr::count_star())));
    }
}
