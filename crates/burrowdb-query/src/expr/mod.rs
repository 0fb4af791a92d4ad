//! Scalar and predicate expressions.
//!
//! [`Expr`] is the expression tree shared by the planner, the selectivity
//! estimator, and the plan nodes. Expressions are evaluated against an
//! [`Environment`] that binds the tuples of the current row.
//!
//! The display form of an expression is significant: the aggregate rewrite
//! pass derives synthetic column names from it, so two aggregate calls that
//! print identically denote the same computed column.

// Builder methods named after comparison operators return new expressions.
#![allow(clippy::should_implement_trait)]

mod environment;

use std::fmt;

use burrowdb_core::{SqlType, Value};

use crate::error::QueryResult;
use crate::exec::Schema;

pub use environment::Environment;
pub(crate) use environment::compare_keys;

/// A possibly table-qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName {
    /// Table or alias qualifier, if any.
    pub table: Option<String>,
    /// Column name.
    pub column: String,
}

impl ColumnName {
    /// Creates an unqualified column name.
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self { table: None, column: column.into() }
    }

    /// Creates a table-qualified column name.
    #[must_use]
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { table: Some(table.into()), column: column.into() }
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterOrEqual,
}

impl CompareOp {
    /// Returns the operator that gives the same result with the operands swapped.
    ///
    /// `a < b` is equivalent to `b > a`; equality operators are symmetric.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::LessThan => Self::GreaterThan,
            Self::LessOrEqual => Self::GreaterOrEqual,
            Self::GreaterThan => Self::LessThan,
            Self::GreaterOrEqual => Self::LessOrEqual,
            op => op,
        }
    }

    /// Returns true if `ordering` (left compared to right) satisfies this operator.
    #[must_use]
    pub fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Equals => ordering == Equal,
            Self::NotEquals => ordering != Equal,
            Self::LessThan => ordering == Less,
            Self::LessOrEqual => ordering != Greater,
            Self::GreaterThan => ordering == Greater,
            Self::GreaterOrEqual => ordering != Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        };
        f.write_str(s)
    }
}

/// N-ary boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Remainder => "%",
        })
    }
}

/// Aggregate functions computed by the grouping node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        })
    }
}

/// Row-at-a-time scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    /// First non-NULL argument.
    Coalesce,
    /// Absolute value.
    Abs,
    /// Lower-case a string.
    Lower,
    /// Upper-case a string.
    Upper,
}

impl fmt::Display for ScalarFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Coalesce => "COALESCE",
            Self::Abs => "ABS",
            Self::Lower => "LOWER",
            Self::Upper => "UPPER",
        })
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant value.
    Literal(Value),

    /// A column reference.
    Column(ColumnName),

    /// A comparison producing a boolean (or NULL).
    Compare {
        /// Left operand.
        left: Box<Expr>,
        /// The operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// An arithmetic operation.
    Arithmetic {
        /// Left operand.
        left: Box<Expr>,
        /// The operator.
        op: ArithmeticOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// AND / OR over one or more terms.
    Boolean {
        /// The connective.
        op: BooleanOp,
        /// The terms.
        terms: Vec<Expr>,
    },

    /// Logical negation.
    Not(Box<Expr>),

    /// Arithmetic negation.
    Negate(Box<Expr>),

    /// `IS NULL` / `IS NOT NULL`.
    IsNull {
        /// The tested expression.
        expr: Box<Expr>,
        /// True for `IS NOT NULL`.
        negated: bool,
    },

    /// A scalar function call.
    Function {
        /// The function.
        func: ScalarFunction,
        /// Its arguments.
        args: Vec<Expr>,
    },

    /// An aggregate function call.
    Aggregate {
        /// The function.
        func: AggregateFunction,
        /// The argument; `None` for `COUNT(*)`.
        arg: Option<Box<Expr>>,
        /// Whether duplicates are removed before aggregating.
        distinct: bool,
    },
}

impl Expr {
    // ========== Constructors ==========

    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a literal NULL.
    #[must_use]
    pub const fn null() -> Self {
        Self::Literal(Value::Null)
    }

    /// Creates an unqualified column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(ColumnName::new(name))
    }

    /// Creates a table-qualified column reference.
    #[must_use]
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column(ColumnName::qualified(table, name))
    }

    fn compare(self, op: CompareOp, other: Self) -> Self {
        Self::Compare { left: Box::new(self), op, right: Box::new(other) }
    }

    fn arithmetic(self, op: ArithmeticOp, other: Self) -> Self {
        Self::Arithmetic { left: Box::new(self), op, right: Box::new(other) }
    }

    fn connect(self, op: BooleanOp, other: Self) -> Self {
        let mut terms = match self {
            Self::Boolean { op: existing, terms } if existing == op => terms,
            expr => vec![expr],
        };
        match other {
            Self::Boolean { op: existing, terms: more } if existing == op => terms.extend(more),
            expr => terms.push(expr),
        }
        Self::Boolean { op, terms }
    }

    /// Creates `self = other`.
    #[must_use]
    pub fn eq(self, other: Self) -> Self {
        self.compare(CompareOp::Equals, other)
    }

    /// Creates `self != other`.
    #[must_use]
    pub fn not_eq(self, other: Self) -> Self {
        self.compare(CompareOp::NotEquals, other)
    }

    /// Creates `self < other`.
    #[must_use]
    pub fn lt(self, other: Self) -> Self {
        self.compare(CompareOp::LessThan, other)
    }

    /// Creates `self <= other`.
    #[must_use]
    pub fn lt_eq(self, other: Self) -> Self {
        self.compare(CompareOp::LessOrEqual, other)
    }

    /// Creates `self > other`.
    #[must_use]
    pub fn gt(self, other: Self) -> Self {
        self.compare(CompareOp::GreaterThan, other)
    }

    /// Creates `self >= other`.
    #[must_use]
    pub fn gt_eq(self, other: Self) -> Self {
        self.compare(CompareOp::GreaterOrEqual, other)
    }

    /// Creates `self + other`.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        self.arithmetic(ArithmeticOp::Add, other)
    }

    /// Creates `self - other`.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        self.arithmetic(ArithmeticOp::Subtract, other)
    }

    /// Creates `self * other`.
    #[must_use]
    pub fn mul(self, other: Self) -> Self {
        self.arithmetic(ArithmeticOp::Multiply, other)
    }

    /// Creates `self / other`.
    #[must_use]
    pub fn div(self, other: Self) -> Self {
        self.arithmetic(ArithmeticOp::Divide, other)
    }

    /// Creates `self AND other`, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.connect(BooleanOp::And, other)
    }

    /// Creates `self OR other`, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        self.connect(BooleanOp::Or, other)
    }

    /// Creates `NOT self`.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Creates `self IS NULL`.
    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull { expr: Box::new(self), negated: false }
    }

    /// Creates `self IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::IsNull { expr: Box::new(self), negated: true }
    }

    /// Creates a scalar function call.
    #[must_use]
    pub fn function(func: ScalarFunction, args: Vec<Self>) -> Self {
        Self::Function { func, args }
    }

    /// Creates `COUNT(*)`.
    #[must_use]
    pub const fn count_star() -> Self {
        Self::Aggregate { func: AggregateFunction::Count, arg: None, distinct: false }
    }

    /// Creates an aggregate call over one argument.
    #[must_use]
    pub fn aggregate(func: AggregateFunction, arg: Self, distinct: bool) -> Self {
        Self::Aggregate { func, arg: Some(Box::new(arg)), distinct }
    }

    /// Conjoins a list of predicates; `None` when the list is empty.
    #[must_use]
    pub fn conjunction(mut terms: Vec<Self>) -> Option<Self> {
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Self::Boolean { op: BooleanOp::And, terms }),
        }
    }

    // ========== Inspection ==========

    /// Returns the column name if this is a plain column reference.
    #[must_use]
    pub const fn as_column(&self) -> Option<&ColumnName> {
        match self {
            Self::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if this expression is an aggregate call.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate { .. })
    }

    /// Returns the direct children of this expression.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Literal(_) | Self::Column(_) => Vec::new(),
            Self::Compare { left, right, .. } | Self::Arithmetic { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Self::Boolean { terms, .. } => terms.iter().collect(),
            Self::Function { args, .. } => args.iter().collect(),
            Self::Not(inner) | Self::Negate(inner) | Self::IsNull { expr: inner, .. } => {
                vec![inner.as_ref()]
            }
            Self::Aggregate { arg, .. } => arg.iter().map(AsRef::as_ref).collect(),
        }
    }

    /// Returns true if this expression or any descendant satisfies `pred`.
    pub fn any(&self, pred: &mut impl FnMut(&Self) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|child| child.any(pred))
    }

    /// Returns every column this expression references, in tree order.
    #[must_use]
    pub fn columns(&self) -> Vec<&ColumnName> {
        match self {
            Self::Column(name) => vec![name],
            _ => self.children().into_iter().flat_map(Self::columns).collect(),
        }
    }

    /// Rebuilds this expression with every direct child passed through `f`.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn map_children<F>(self, mut f: F) -> QueryResult<Self>
    where
        F: FnMut(Self) -> QueryResult<Self>,
    {
        let mut boxed = |expr: Box<Self>| f(*expr).map(Box::new);
        Ok(match self {
            leaf @ (Self::Literal(_) | Self::Column(_)) => leaf,
            Self::Compare { left, op, right } => {
                let left = boxed(left)?;
                Self::Compare { left, op, right: boxed(right)? }
            }
            Self::Arithmetic { left, op, right } => {
                let left = boxed(left)?;
                Self::Arithmetic { left, op, right: boxed(right)? }
            }
            Self::Boolean { op, terms } => Self::Boolean {
                op,
                terms: terms.into_iter().map(|t| boxed(Box::new(t)).map(|b| *b)).collect::<QueryResult<_>>()?,
            },
            Self::Not(inner) => Self::Not(boxed(inner)?),
            Self::Negate(inner) => Self::Negate(boxed(inner)?),
            Self::IsNull { expr, negated } => Self::IsNull { expr: boxed(expr)?, negated },
            Self::Function { func, args } => Self::Function {
                func,
                args: args.into_iter().map(|a| boxed(Box::new(a)).map(|b| *b)).collect::<QueryResult<_>>()?,
            },
            Self::Aggregate { func, arg, distinct } => {
                Self::Aggregate { func, arg: arg.map(&mut boxed).transpose()?, distinct }
            }
        })
    }

    /// Walks the tree depth-first, calling [`ExprProcessor::enter`] on the way
    /// down and [`ExprProcessor::leave`] on the way up.
    ///
    /// `leave` receives the node with its children already rebuilt and
    /// returns the node that replaces it.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the processor.
    pub fn traverse<P: ExprProcessor + ?Sized>(self, processor: &mut P) -> QueryResult<Self> {
        processor.enter(&self)?;
        let rebuilt = self.map_children(|child| child.traverse(processor))?;
        processor.leave(rebuilt)
    }

    /// Infers the SQL type this expression produces against `schema`.
    ///
    /// Unresolvable columns are reported as `VARCHAR(255)`; evaluation
    /// reports the real error.
    #[must_use]
    pub fn sql_type(&self, schema: &Schema) -> SqlType {
        match self {
            Self::Literal(value) => literal_type(value),
            Self::Column(name) => schema
                .column_index(name)
                .ok()
                .and_then(|i| schema.column_info(i))
                .map_or(SqlType::VarChar(255), |c| c.sql_type),
            Self::Compare { .. } | Self::Boolean { .. } | Self::Not(_) | Self::IsNull { .. } => {
                SqlType::Boolean
            }
            Self::Arithmetic { left, right, .. } => {
                if left.sql_type(schema).is_integer() && right.sql_type(schema).is_integer() {
                    SqlType::BigInt
                } else {
                    SqlType::Double
                }
            }
            Self::Negate(inner) => inner.sql_type(schema),
            Self::Function { func, args } => match func {
                ScalarFunction::Coalesce | ScalarFunction::Abs => {
                    args.first().map_or(SqlType::Integer, |a| a.sql_type(schema))
                }
                ScalarFunction::Lower | ScalarFunction::Upper => {
                    args.first().map_or(SqlType::VarChar(255), |a| a.sql_type(schema))
                }
            },
            Self::Aggregate { func, arg, .. } => match func {
                AggregateFunction::Count => SqlType::BigInt,
                AggregateFunction::Avg => SqlType::Double,
                AggregateFunction::Sum => match arg.as_ref().map(|a| a.sql_type(schema)) {
                    Some(t) if t.is_integer() => SqlType::BigInt,
                    _ => SqlType::Double,
                },
                AggregateFunction::Min | AggregateFunction::Max => {
                    arg.as_ref().map_or(SqlType::Integer, |a| a.sql_type(schema))
                }
            },
        }
    }
}

fn literal_type(value: &Value) -> SqlType {
    match value {
        Value::Null | Value::Int(_) => SqlType::Integer,
        Value::Bool(_) => SqlType::Boolean,
        Value::Float(_) => SqlType::Double,
        Value::String(s) => SqlType::VarChar(u16::try_from(s.chars().count()).unwrap_or(u16::MAX)),
    }
}

/// A visitor that can inspect and replace nodes during [`Expr::traverse`].
pub trait ExprProcessor {
    /// Called before the children of `expr` are visited.
    ///
    /// # Errors
    ///
    /// An error aborts the traversal.
    fn enter(&mut self, expr: &Expr) -> QueryResult<()>;

    /// Called after the children of `expr` are visited; returns the replacement node.
    ///
    /// # Errors
    ///
    /// An error aborts the traversal.
    fn leave(&mut self, expr: Expr) -> QueryResult<Expr>;
}

/// Writes an operand, parenthesized when it is itself an operator expression.
fn fmt_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Compare { .. } | Expr::Arithmetic { .. } | Expr::Boolean { .. } | Expr::Not(_) => {
            write!(f, "({expr})")
        }
        _ => write!(f, "{expr}"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Column(name) => write!(f, "{name}"),
            Self::Compare { left, op, right } => {
                fmt_operand(f, left)?;
                write!(f, " {op} ")?;
                fmt_operand(f, right)
            }
            Self::Arithmetic { left, op, right } => {
                fmt_operand(f, left)?;
                write!(f, " {op} ")?;
                fmt_operand(f, right)
            }
            Self::Boolean { op, terms } => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    fmt_operand(f, term)?;
                }
                Ok(())
            }
            Self::Not(inner) => {
                write!(f, "NOT ")?;
                fmt_operand(f, inner)
            }
            Self::Negate(inner) => {
                write!(f, "-")?;
                fmt_operand(f, inner)
            }
            Self::IsNull { expr, negated } => {
                fmt_operand(f, expr)?;
                write!(f, " IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Self::Function { func, args } => {
                write!(f, "{func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::Aggregate { func, arg, distinct } => {
                write!(f, "{func}(")?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                match arg {
                    Some(arg) => write!(f, "{arg})"),
                    None => write!(f, "*)"),
                }
            }
        }
    }
}
