//! Expression evaluation against the tuples of the current row.

use std::cmp::Ordering;

use burrowdb_core::{CoreError, Value};

use super::{ArithmeticOp, BooleanOp, ColumnName, Expr, ScalarFunction};
use crate::error::{QueryError, QueryResult};
use crate::exec::Schema;

/// Binds one or more tuples, each described by a schema, for expression evaluation.
///
/// An environment borrows its tuples and is meant to be built fresh for each
/// evaluation; nothing is shared between rows.
#[derive(Debug, Default)]
pub struct Environment<'a> {
    bindings: Vec<(&'a Schema, &'a [Value])>,
}

impl<'a> Environment<'a> {
    /// Creates an empty environment.
    #[must_use]
    pub const fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Creates an environment holding a single tuple.
    #[must_use]
    pub fn with_tuple(schema: &'a Schema, values: &'a [Value]) -> Self {
        let mut env = Self::new();
        env.add_tuple(schema, values);
        env
    }

    /// Binds another tuple.
    pub fn add_tuple(&mut self, schema: &'a Schema, values: &'a [Value]) {
        self.bindings.push((schema, values));
    }

    /// Resolves a column reference across every bound tuple.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Evaluation`] if no bound column matches or if
    /// more than one does.
    pub fn lookup(&self, name: &ColumnName) -> QueryResult<&'a Value> {
        let mut found: Option<&'a Value> = None;
        for &(schema, values) in &self.bindings {
            for index in schema.find_columns(name) {
                if found.is_some() {
                    return Err(QueryError::evaluation(format!("ambiguous column reference {name}")));
                }
                let value = values.get(index).ok_or_else(|| {
                    QueryError::evaluation(format!("tuple is too short for column {name}"))
                })?;
                found = Some(value);
            }
        }
        found.ok_or_else(|| QueryError::evaluation(format!("unknown column {name}")))
    }
}

impl Expr {
    /// Evaluates this expression.
    ///
    /// NULL propagates through comparisons, arithmetic and scalar functions;
    /// AND/OR/NOT follow SQL three-valued logic.
    ///
    /// # Errors
    ///
    /// Returns an evaluation error for unknown columns, type mismatches,
    /// integer overflow, division by zero, and aggregate calls that were not
    /// rewritten into column references.
    pub fn evaluate(&self, env: &Environment<'_>) -> QueryResult<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Column(name) => env.lookup(name).cloned(),
            Self::Compare { left, op, right } => {
                let (l, r) = (left.evaluate(env)?, right.evaluate(env)?);
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                let ordering = l
                    .sql_cmp(&r)
                    .ok_or_else(|| CoreError::type_mismatch(l.type_name(), r.type_name()))?;
                Ok(Value::Bool(op.accepts(ordering)))
            }
            Self::Arithmetic { left, op, right } => {
                arithmetic(*op, &left.evaluate(env)?, &right.evaluate(env)?)
            }
            Self::Boolean { op, terms } => {
                // `decisive` short-circuits: FALSE for AND, TRUE for OR.
                let decisive = *op == BooleanOp::Or;
                let mut saw_null = false;
                for term in terms {
                    match term.evaluate(env)? {
                        Value::Bool(b) if b == decisive => return Ok(Value::Bool(decisive)),
                        Value::Bool(_) => {}
                        Value::Null => saw_null = true,
                        other => {
                            return Err(CoreError::type_mismatch("BOOLEAN", other.type_name()).into())
                        }
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Bool(!decisive) })
            }
            Self::Not(inner) => match inner.evaluate(env)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Null => Ok(Value::Null),
                other => Err(CoreError::type_mismatch("BOOLEAN", other.type_name()).into()),
            },
            Self::Negate(inner) => match inner.evaluate(env)? {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| QueryError::evaluation("integer overflow")),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(CoreError::type_mismatch("numeric", other.type_name()).into()),
            },
            Self::IsNull { expr, negated } => Ok(Value::Bool(expr.evaluate(env)?.is_null() != *negated)),
            Self::Function { func, args } => {
                let values = args.iter().map(|a| a.evaluate(env)).collect::<QueryResult<Vec<_>>>()?;
                scalar(*func, values)
            }
            Self::Aggregate { .. } => Err(QueryError::evaluation(format!(
                "aggregate {self} cannot be evaluated outside of a grouping operator"
            ))),
        }
    }

    /// Evaluates this expression as a predicate; NULL counts as false.
    ///
    /// # Errors
    ///
    /// Returns an evaluation error if evaluation fails or the result is not boolean.
    pub fn evaluate_predicate(&self, env: &Environment<'_>) -> QueryResult<bool> {
        match self.evaluate(env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(CoreError::type_mismatch("BOOLEAN", other.type_name()).into()),
        }
    }
}

fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> QueryResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        if b == 0 && matches!(op, ArithmeticOp::Divide | ArithmeticOp::Remainder) {
            return Err(QueryError::evaluation("division by zero"));
        }
        let result = match op {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
            ArithmeticOp::Divide => a.checked_div(b),
            ArithmeticOp::Remainder => a.checked_rem(b),
        };
        return result.map(Value::Int).ok_or_else(|| QueryError::evaluation("integer overflow"));
    }

    let (Some(a), Some(b)) = (left.to_f64(), right.to_f64()) else {
        let culprit = if left.is_numeric() { right } else { left };
        return Err(CoreError::type_mismatch("numeric", culprit.type_name()).into());
    };
    if b == 0.0 && matches!(op, ArithmeticOp::Divide | ArithmeticOp::Remainder) {
        return Err(QueryError::evaluation("division by zero"));
    }
    Ok(Value::Float(match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => a / b,
        ArithmeticOp::Remainder => a % b,
    }))
}

fn scalar(func: ScalarFunction, mut args: Vec<Value>) -> QueryResult<Value> {
    if func == ScalarFunction::Coalesce {
        return Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null));
    }
    if args.len() != 1 {
        return Err(QueryError::evaluation(format!("{func} takes exactly one argument")));
    }
    let arg = args.swap_remove(0);
    match (func, arg) {
        (_, Value::Null) => Ok(Value::Null),
        (ScalarFunction::Abs, Value::Int(i)) => {
            i.checked_abs().map(Value::Int).ok_or_else(|| QueryError::evaluation("integer overflow"))
        }
        (ScalarFunction::Abs, Value::Float(f)) => Ok(Value::Float(f.abs())),
        (ScalarFunction::Lower, Value::String(s)) => Ok(Value::String(s.to_lowercase())),
        (ScalarFunction::Upper, Value::String(s)) => Ok(Value::String(s.to_uppercase())),
        (func, other) => Err(QueryError::evaluation(format!(
            "{func} is not defined for {}",
            other.type_name()
        ))),
    }
}

/// Orders two rows of sort-key values, honoring per-key direction.
pub(crate) fn compare_keys(left: &[Value], right: &[Value], ascending: &[bool]) -> Ordering {
    left.iter()
        .zip(right)
        .zip(ascending)
        .map(|((l, r), asc)| if *asc { l.total_cmp(r) } else { r.total_cmp(l) })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use burrowdb_core::SqlType;

    use super::*;
    use crate::exec::ColumnInfo;

    fn schema(table: &str, names: &[&str]) -> Schema {
        Schema::new(names.iter().map(|n| ColumnInfo::new(*n, Some(table), SqlType::Integer)).collect())
    }

    #[test]
    fn resolves_qualified_and_unqualified_columns() {
        let left = schema("t1", &["a", "b"]);
        let right = schema("t2", &["b", "c"]);
        let lv = vec![Value::Int(10), Value::Int(1)];
        let rv = vec![Value::Int(1), Value::Int(100)];
        let mut env = Environment::new();
        env.add_tuple(&left, &lv);
        env.add_tuple(&right, &rv);

        assert_eq!(Expr::column("a").evaluate(&env).unwrap(), Value::Int(10));
        assert_eq!(Expr::qualified_column("t2", "b").evaluate(&env).unwrap(), Value::Int(1));
        assert!(Expr::qualified_column("t1", "b").eq(Expr::qualified_column("t2", "b"))
            .evaluate_predicate(&env)
            .unwrap());

        let ambiguous = Expr::column("b").evaluate(&env).unwrap_err();
        assert!(ambiguous.to_string().contains("ambiguous"));
        let unknown = Expr::column("zz").evaluate(&env).unwrap_err();
        assert!(unknown.to_string().contains("unknown column"));
    }

    #[test]
    fn three_valued_logic() {
        let env = Environment::new();
        let null_cmp = Expr::null().eq(Expr::literal(1));
        assert_eq!(null_cmp.evaluate(&env).unwrap(), Value::Null);
        assert!(!null_cmp.evaluate_predicate(&env).unwrap());

        let t = Expr::literal(true);
        let f = Expr::literal(false);
        assert_eq!(Expr::null().and(f.clone()).evaluate(&env).unwrap(), Value::Bool(false));
        assert_eq!(Expr::null().and(t.clone()).evaluate(&env).unwrap(), Value::Null);
        assert_eq!(Expr::null().or(t).evaluate(&env).unwrap(), Value::Bool(true));
        assert_eq!(Expr::null().or(f).evaluate(&env).unwrap(), Value::Null);
        assert_eq!(Expr::null().not().evaluate(&env).unwrap(), Value::Null);
        assert_eq!(Expr::null().is_null().evaluate(&env).unwrap(), Value::Bool(true));
    }

    #[test]
    fn arithmetic_rules() {
        let env = Environment::new();
        assert_eq!(Expr::literal(7).div(Expr::literal(2)).evaluate(&env).unwrap(), Value::Int(3));
        assert_eq!(Expr::literal(1).add(Expr::literal(0.5)).evaluate(&env).unwrap(), Value::Float(1.5));
        assert!(Expr::literal(1).div(Expr::literal(0)).evaluate(&env).is_err());
        assert!(Expr::literal(i64::MAX).add(Expr::literal(1)).evaluate(&env).is_err());
        assert!(Expr::literal("a").add(Expr::literal(1)).evaluate(&env).is_err());
    }

    #[test]
    fn scalar_functions() {
        let env = Environment::new();
        let coalesce = Expr::function(ScalarFunction::Coalesce, vec![Expr::null(), Expr::literal(3)]);
        assert_eq!(coalesce.evaluate(&env).unwrap(), Value::Int(3));
        let upper = Expr::function(ScalarFunction::Upper, vec![Expr::literal("ab")]);
        assert_eq!(upper.evaluate(&env).unwrap(), Value::from("AB"));
    }

    #[test]
    fn unrewritten_aggregates_fail() {
        let err = Expr::count_star().evaluate(&Environment::new()).unwrap_err();
        assert!(matches!(err, QueryError::Evaluation(_)));
    }

    #[test]
    fn key_comparison_respects_direction() {
        let a = [Value::Int(1), Value::Int(5)];
        let b = [Value::Int(1), Value::Int(7)];
        assert_eq!(compare_keys(&a, &b, &[true, true]), Ordering::Less);
        assert_eq!(compare_keys(&a, &b, &[true, false]), Ordering::Greater);
    }
}
