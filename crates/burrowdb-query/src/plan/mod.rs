//! Query planning.
//!
//! # Modules
//!
//! - [`stats`] - Table and column statistics
//! - [`cost`] - Plan cost estimates
//! - [`selectivity`] - Predicate selectivity estimation
//! - [`aggregates`] - Aggregate-call rewriting
//! - [`planner`] - Plan construction from a parsed `SELECT`

pub mod aggregates;
pub mod cost;
pub mod planner;
pub mod selectivity;
pub mod stats;

pub use aggregates::{aggregate_key, contains_aggregate, AggregateReplacer, GroupAggregates};
pub use cost::{CostModel, PlanCost};
pub use planner::{Planner, PlannerConfig};
pub use selectivity::{
    estimate_selectivity, type_supports_compare_estimates, SelectivityConfig, DEFAULT_SELECTIVITY,
};
pub use stats::{ColumnStats, TableStats};
