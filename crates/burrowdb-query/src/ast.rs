//! Parsed `SELECT` statements, as handed to the planner.
//!
//! SQL text parsing happens elsewhere; these types are the parser's output.

use std::fmt;

use crate::expr::Expr;

/// The kind of join between two relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Pairs that satisfy the predicate.
    Inner,
    /// Every pair.
    Cross,
    /// Inner results plus unmatched left rows padded with NULLs.
    LeftOuter,
    /// Inner results plus unmatched right rows padded with NULLs.
    RightOuter,
    /// Left and right outer results combined.
    FullOuter,
    /// Left rows with at least one match, each emitted once.
    Semijoin,
    /// Left rows with no match.
    Antijoin,
}

impl JoinType {
    /// Returns true if unmatched left rows are kept.
    #[must_use]
    pub const fn preserves_left(self) -> bool {
        matches!(self, Self::LeftOuter | Self::FullOuter)
    }

    /// Returns true if the output holds only the left relation's columns.
    #[must_use]
    pub const fn left_columns_only(self) -> bool {
        matches!(self, Self::Semijoin | Self::Antijoin)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inner => "INNER",
            Self::Cross => "CROSS",
            Self::LeftOuter => "LEFT OUTER",
            Self::RightOuter => "RIGHT OUTER",
            Self::FullOuter => "FULL OUTER",
            Self::Semijoin => "SEMIJOIN",
            Self::Antijoin => "ANTIJOIN",
        })
    }
}

/// How the two sides of a join are matched.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    /// No condition: every pair matches.
    None,
    /// `ON predicate`.
    On(Expr),
    /// `USING (col, ...)`.
    Using(Vec<String>),
    /// `NATURAL`: equality on every column name the two sides share.
    Natural,
}

/// A relation in the `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    /// A stored table, optionally aliased.
    BaseTable {
        /// Table name.
        table: String,
        /// `AS alias`.
        alias: Option<String>,
    },
    /// A derived table.
    Subquery {
        /// The nested query.
        select: Box<SelectClause>,
        /// The required alias.
        alias: String,
    },
    /// A join of two relations.
    Join {
        /// Left relation.
        left: Box<FromClause>,
        /// Right relation.
        right: Box<FromClause>,
        /// Join kind.
        join_type: JoinType,
        /// Join condition.
        condition: JoinCondition,
    },
}

impl FromClause {
    /// A base table.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self::BaseTable { table: name.into(), alias: None }
    }

    /// A base table with an alias.
    #[must_use]
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::BaseTable { table: name.into(), alias: Some(alias.into()) }
    }

    /// A derived table.
    #[must_use]
    pub fn subquery(select: SelectClause, alias: impl Into<String>) -> Self {
        Self::Subquery { select: Box::new(select), alias: alias.into() }
    }

    /// A join of `self` with `right`.
    #[must_use]
    pub fn join(self, right: Self, join_type: JoinType, condition: JoinCondition) -> Self {
        Self::Join { left: Box::new(self), right: Box::new(right), join_type, condition }
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectValue {
    /// `*` or `table.*`.
    Wildcard {
        /// Restricts the wildcard to one table.
        table: Option<String>,
    },
    /// An expression with an optional alias.
    Expr {
        /// The expression.
        expr: Expr,
        /// `AS alias`.
        alias: Option<String>,
    },
}

impl SelectValue {
    /// `*`
    #[must_use]
    pub const fn wildcard() -> Self {
        Self::Wildcard { table: None }
    }

    /// An unaliased expression.
    #[must_use]
    pub const fn expr(expr: Expr) -> Self {
        Self::Expr { expr, alias: None }
    }

    /// An aliased expression.
    #[must_use]
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self::Expr { expr, alias: Some(alias.into()) }
    }
}

impl fmt::Display for SelectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard { table: Some(table) } => write!(f, "{table}.*"),
            Self::Wildcard { table: None } => write!(f, "*"),
            Self::Expr { expr, alias: Some(alias) } => write!(f, "{expr} AS {alias}"),
            Self::Expr { expr, alias: None } => write!(f, "{expr}"),
        }
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    /// The sort key.
    pub expr: Expr,
    /// Ascending (`true`) or descending.
    pub ascending: bool,
}

impl OrderByExpr {
    /// An ascending key.
    #[must_use]
    pub const fn asc(expr: Expr) -> Self {
        Self { expr, ascending: true }
    }

    /// A descending key.
    #[must_use]
    pub const fn desc(expr: Expr) -> Self {
        Self { expr, ascending: false }
    }
}

impl fmt::Display for OrderByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, if self.ascending { "ASC" } else { "DESC" })
    }
}

/// A `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    /// The select list.
    pub select_values: Vec<SelectValue>,
    /// The `FROM` clause; `None` for `SELECT 1 + 1`.
    pub from: Option<FromClause>,
    /// `WHERE` predicate.
    pub where_expr: Option<Expr>,
    /// `GROUP BY` expressions.
    pub group_by: Vec<Expr>,
    /// `HAVING` predicate.
    pub having: Option<Expr>,
    /// `ORDER BY` keys.
    pub order_by: Vec<OrderByExpr>,
    /// `LIMIT`.
    pub limit: Option<u64>,
    /// `OFFSET`.
    pub offset: u64,
}

impl SelectClause {
    /// Creates a statement with the given select list and nothing else.
    #[must_use]
    pub fn new(select_values: Vec<SelectValue>) -> Self {
        Self {
            select_values,
            from: None,
            where_expr: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// `SELECT * FROM from`.
    #[must_use]
    pub fn select_all(from: FromClause) -> Self {
        Self::new(vec![SelectValue::wildcard()]).from(from)
    }

    /// Sets the `FROM` clause.
    #[must_use]
    pub fn from(mut self, from: FromClause) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the `WHERE` predicate.
    #[must_use]
    pub fn where_clause(mut self, predicate: Expr) -> Self {
        self.where_expr = Some(predicate);
        self
    }

    /// Sets the `GROUP BY` list.
    #[must_use]
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Sets the `HAVING` predicate.
    #[must_use]
    pub fn having(mut self, predicate: Expr) -> Self {
        self.having = Some(predicate);
        self
    }

    /// Sets the `ORDER BY` keys.
    #[must_use]
    pub fn order_by(mut self, keys: Vec<OrderByExpr>) -> Self {
        self.order_by = keys;
        self
    }

    /// Sets `LIMIT`.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets `OFFSET`.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true for `SELECT *`, which needs no projection.
    #[must_use]
    pub fn is_trivial_projection(&self) -> bool {
        matches!(self.select_values.as_slice(), [SelectValue::Wildcard { table: None }])
    }
}
