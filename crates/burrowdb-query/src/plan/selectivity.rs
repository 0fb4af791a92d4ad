//! Predicate selectivity estimation.
//!
//! Maps a predicate plus column statistics to the estimated fraction of rows
//! that satisfy it. Estimation never fails: anything the rules below do not
//! cover falls back to [`SelectivityConfig::default_selectivity`].
//!
//! - `AND` multiplies its terms, `OR` is `1 - Π(1 - s)`, `NOT` is `1 - s`.
//! - `column OP literal` (in either operand order) uses the column's distinct
//!   count for equality and its min/max range for inequalities. `!=` is
//!   always the complement of `=`.
//! - `column OP column` uses the larger distinct count for `=` and `!=`.

use burrowdb_core::{SqlType, Value};
use tracing::trace;

use crate::exec::Schema;
use crate::expr::{BooleanOp, ColumnName, CompareOp, Expr};
use crate::plan::ColumnStats;

/// Selectivity used when nothing better is known.
pub const DEFAULT_SELECTIVITY: f32 = 0.25;

/// Tunables for the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectivityConfig {
    /// Fallback selectivity for predicates the estimator cannot analyze.
    pub default_selectivity: f32,
}

impl SelectivityConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self { default_selectivity: DEFAULT_SELECTIVITY }
    }

    /// Sets the fallback selectivity, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_default_selectivity(mut self, selectivity: f32) -> Self {
        self.default_selectivity = selectivity.clamp(0.0, 1.0);
        self
    }
}

impl Default for SelectivityConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true for the column types whose range comparisons can be estimated.
#[must_use]
pub const fn type_supports_compare_estimates(sql_type: SqlType) -> bool {
    sql_type.is_numeric()
}

/// Estimates the fraction of rows satisfying `expr`.
///
/// `stats` holds one entry per column of `schema`. The result is in `[0, 1]`.
#[must_use]
pub fn estimate_selectivity(
    expr: &Expr,
    schema: &Schema,
    stats: &[ColumnStats],
    config: &SelectivityConfig,
) -> f32 {
    let selectivity = Estimator { schema, stats, config }.estimate(expr).clamp(0.0, 1.0);
    trace!(%expr, selectivity, "estimated selectivity");
    selectivity
}

struct Estimator<'a> {
    schema: &'a Schema,
    stats: &'a [ColumnStats],
    config: &'a SelectivityConfig,
}

impl Estimator<'_> {
    fn fallback(&self) -> f32 {
        self.config.default_selectivity
    }

    fn estimate(&self, expr: &Expr) -> f32 {
        match expr {
            Expr::Boolean { op: BooleanOp::And, terms } => {
                terms.iter().map(|t| self.estimate(t)).product()
            }
            Expr::Boolean { op: BooleanOp::Or, terms } => {
                1.0 - terms.iter().map(|t| 1.0 - self.estimate(t)).product::<f32>()
            }
            Expr::Not(inner) => 1.0 - self.estimate(inner),
            Expr::Compare { left, op, right } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(column), Expr::Literal(value)) => self.column_value(column, *op, value),
                (Expr::Literal(value), Expr::Column(column)) => {
                    self.column_value(column, op.flip(), value)
                }
                (Expr::Column(l), Expr::Column(r)) => self.column_column(l, *op, r),
                _ => self.fallback(),
            },
            _ => self.fallback(),
        }
    }

    fn lookup(&self, column: &ColumnName) -> Option<(SqlType, &ColumnStats)> {
        let index = self.schema.column_index(column).ok()?;
        let info = self.schema.column_info(index)?;
        Some((info.sql_type, self.stats.get(index)?))
    }

    fn column_value(&self, column: &ColumnName, op: CompareOp, value: &Value) -> f32 {
        let Some((sql_type, stats)) = self.lookup(column) else {
            return self.fallback();
        };
        match op {
            CompareOp::Equals => self.equals_value(stats, value),
            CompareOp::NotEquals => 1.0 - self.equals_value(stats, value),
            CompareOp::LessOrEqual | CompareOp::GreaterThan => {
                match range_fraction(sql_type, stats, value, RangeSide::AtMost) {
                    Some(le) if op == CompareOp::LessOrEqual => le,
                    Some(le) => 1.0 - le,
                    None => self.fallback(),
                }
            }
            CompareOp::GreaterOrEqual | CompareOp::LessThan => {
                match range_fraction(sql_type, stats, value, RangeSide::AtLeast) {
                    Some(ge) if op == CompareOp::GreaterOrEqual => ge,
                    Some(ge) => 1.0 - ge,
                    None => self.fallback(),
                }
            }
        }
    }

    fn equals_value(&self, stats: &ColumnStats, value: &Value) -> f32 {
        let Some(distinct) = stats.num_unique_values else {
            return self.fallback();
        };
        let below = stats.min_value.as_ref().and_then(|min| value.sql_cmp(min)).is_some_and(|o| o.is_lt());
        let above = stats.max_value.as_ref().and_then(|max| value.sql_cmp(max)).is_some_and(|o| o.is_gt());
        if below || above || distinct == 0 {
            0.0
        } else {
            1.0 / distinct as f32
        }
    }

    fn column_column(&self, left: &ColumnName, op: CompareOp, right: &ColumnName) -> f32 {
        if !matches!(op, CompareOp::Equals | CompareOp::NotEquals) {
            return self.fallback();
        }
        let distinct = |c: &ColumnName| self.lookup(c).and_then(|(_, s)| s.num_unique_values);
        let equals = match (distinct(left), distinct(right)) {
            (Some(l), Some(r)) if l.max(r) == 0 => 0.0,
            (Some(l), Some(r)) => 1.0 / l.max(r) as f32,
            _ => self.fallback(),
        };
        if op == CompareOp::Equals {
            equals
        } else {
            1.0 - equals
        }
    }
}

#[derive(Clone, Copy)]
enum RangeSide {
    /// Fraction of rows with `column <= value`.
    AtMost,
    /// Fraction of rows with `column >= value`.
    AtLeast,
}

/// Linear interpolation over `[min, max]`; `None` when the column or stats do not allow it.
fn range_fraction(sql_type: SqlType, stats: &ColumnStats, value: &Value, side: RangeSide) -> Option<f32> {
    if !type_supports_compare_estimates(sql_type) {
        return None;
    }
    let min = stats.min_value.as_ref()?.to_f64()?;
    let max = stats.max_value.as_ref()?.to_f64()?;
    let v = value.to_f64()?;
    if min == max {
        return None;
    }
    let fraction = match side {
        RangeSide::AtMost if v < min => 0.0,
        RangeSide::AtMost if v > max => 1.0,
        RangeSide::AtMost => (v - min) / (max - min),
        RangeSide::AtLeast if v < min => 1.0,
        RangeSide::AtLeast if v > max => 0.0,
        RangeSide::AtLeast => (max - v) / (max - min),
    };
    Some((fraction as f32).clamp(0.0, 1.0))
}
