//! `BurrowDB` Query
//!
//! The query-execution core of `BurrowDB`: pull-based plan nodes, the
//! expression evaluator they call, the selectivity and cost estimates that
//! annotate a plan, and the rule-based planner that assembles plans from
//! parsed `SELECT` statements.
//!
//! # Example
//!
//! ```
//! use burrowdb_core::{SqlType, Value};
//! use burrowdb_query::ast::{FromClause, SelectClause, SelectValue};
//! use burrowdb_query::exec::collect_tuples;
//! use burrowdb_query::expr::Expr;
//! use burrowdb_query::plan::{Planner, PlannerConfig};
//! use burrowdb_query::storage::MemoryStorage;
//!
//! let storage = MemoryStorage::new();
//! storage.create_table("t", &[("a", SqlType::Integer), ("b", SqlType::Integer)]).unwrap();
//! storage.insert("t", vec![Value::Int(1), Value::Int(10)]).unwrap();
//! storage.insert("t", vec![Value::Int(2), Value::Int(20)]).unwrap();
//!
//! // SELECT b FROM t WHERE a > 1
//! let select = SelectClause::new(vec![SelectValue::expr(Expr::column("b"))])
//!     .from(FromClause::table("t"))
//!     .where_clause(Expr::column("a").gt(Expr::literal(1)));
//!
//! let planner = Planner::new(&storage, PlannerConfig::new());
//! let mut plan = planner.make_plan(&select, &[]).unwrap();
//! let rows = collect_tuples(plan.as_mut()).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].values(), &[Value::Int(20)]);
//! ```
//!
//! # Modules
//!
//! - [`ast`] - Parsed `SELECT` statements
//! - [`expr`] - Expressions and their evaluation
//! - [`exec`] - Plan nodes and the iterator protocol
//! - [`plan`] - Statistics, cost, selectivity, aggregate rewriting, planning
//! - [`storage`] - In-memory paged tables
//! - [`error`] - Error types

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod ast;
pub mod error;
pub mod exec;
pub mod expr;
pub mod plan;
pub mod storage;

pub use error::{QueryError, QueryResult};
pub use exec::{collect_tuples, explain, BoxedNode, PlanNode, Schema, Tuple};
pub use plan::{Planner, PlannerConfig};
pub use storage::{MemoryStorage, StorageError, TableCatalog};
