//! Query execution.
//!
//! Execution uses a pull-based iterator model: each operator implements
//! [`PlanNode`] and pulls tuples from its children on demand. Data flows from
//! the leaves (table scans, literal rows) up to the root.
//!
//! # Modules
//!
//! - [`schema`] - Column descriptions
//! - [`tuple`] - Rows and their storage locations
//! - [`node`] - The plan node trait and shared node state
//! - [`operators`] - Concrete plan nodes

pub mod node;
pub mod operators;
pub mod schema;
pub mod tuple;

pub use node::{explain, BoxedNode, NodeBase, OperationType, PlanNode};
pub use schema::{ColumnInfo, Schema};
pub use tuple::{Tuple, TupleLocation};

use crate::error::QueryResult;

/// Runs a prepared plan to completion and returns every tuple it produces.
///
/// The plan is initialized, drained and cleaned up. Returned tuples are
/// detached from storage pages.
///
/// # Errors
///
/// Returns the first error raised by the plan.
pub fn collect_tuples(node: &mut dyn PlanNode) -> QueryResult<Vec<Tuple>> {
    node.initialize()?;
    let mut tuples = Vec::new();
    while let Some(mut tuple) = node.next_tuple()? {
        tuple.unpin();
        tuples.push(tuple);
    }
    node.clean_up()?;
    Ok(tuples)
}
