//! Concrete plan nodes.
//!
//! - **Leaves**: [`scan`] (stored tables), [`values`] (literal rows)
//! - **Row-at-a-time**: [`filter`], [`project`], [`rename`], [`limit`]
//! - **Materializing**: [`sort`], [`aggregate`]
//! - **Joins**: [`join`]

pub mod aggregate;
pub mod filter;
pub mod join;
pub mod limit;
pub mod project;
pub mod rename;
pub mod scan;
pub mod sort;
pub mod values;

pub use aggregate::HashedGroupAggregateNode;
pub use filter::FilterNode;
pub use join::NestedLoopJoinNode;
pub use limit::LimitNode;
pub use project::ProjectNode;
pub use rename::RenameNode;
pub use scan::FileScanNode;
pub use sort::SortNode;
pub use values::ValuesNode;
