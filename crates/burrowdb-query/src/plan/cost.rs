//! Plan cost estimates.
//!
//! Every plan node computes a [`PlanCost`] bottom-up in `prepare()` using the
//! formulas of a [`CostModel`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::JoinType;
use crate::plan::TableStats;

/// Estimated output size and work of a plan node, including its subtree.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanCost {
    /// Estimated number of output tuples.
    pub num_tuples: f32,
    /// Estimated average output tuple width, in bytes.
    pub tuple_size: f32,
    /// Abstract CPU work.
    pub cpu_cost: f32,
    /// Estimated page reads.
    pub num_block_ios: u64,
}

impl PlanCost {
    /// Creates a cost estimate.
    #[must_use]
    pub const fn new(num_tuples: f32, tuple_size: f32, cpu_cost: f32, num_block_ios: u64) -> Self {
        Self { num_tuples, tuple_size, cpu_cost, num_block_ios }
    }
}

impl fmt::Display for PlanCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[tuples={:.1}, tupSize={:.1}, cpuCost={:.1}, blockIOs={}]",
            self.num_tuples, self.tuple_size, self.cpu_cost, self.num_block_ios
        )
    }
}

/// Cost constants and the formulas that combine child costs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// CPU cost of handling one tuple (scanning, filtering, projecting, pairing).
    pub tuple_cost: f32,
    /// Multiplier on `n log2 n` for sorting.
    pub sort_cost_factor: f32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel {
    /// Creates the default cost model.
    #[must_use]
    pub const fn new() -> Self {
        Self { tuple_cost: 1.0, sort_cost_factor: 1.0 }
    }

    /// Sets the per-tuple CPU cost.
    #[must_use]
    pub const fn with_tuple_cost(mut self, cost: f32) -> Self {
        self.tuple_cost = cost;
        self
    }

    /// Sets the sort multiplier.
    #[must_use]
    pub const fn with_sort_cost_factor(mut self, factor: f32) -> Self {
        self.sort_cost_factor = factor;
        self
    }

    /// Sequential scan of a table, keeping `selectivity` of its rows.
    #[must_use]
    pub fn file_scan(&self, stats: &TableStats, selectivity: f32) -> PlanCost {
        let rows = stats.num_tuples as f32;
        PlanCost::new(rows * selectivity, stats.avg_tuple_size, rows * self.tuple_cost, stats.num_data_pages)
    }

    /// Literal rows.
    #[must_use]
    pub fn values(&self, rows: usize, tuple_size: f32) -> PlanCost {
        PlanCost::new(rows as f32, tuple_size, rows as f32 * self.tuple_cost, 0)
    }

    /// Predicate filter over `child`.
    #[must_use]
    pub fn filter(&self, child: &PlanCost, selectivity: f32) -> PlanCost {
        PlanCost {
            num_tuples: child.num_tuples * selectivity,
            cpu_cost: child.cpu_cost + child.num_tuples * self.tuple_cost,
            ..*child
        }
    }

    /// Projection producing tuples of `tuple_size` bytes.
    #[must_use]
    pub fn project(&self, child: &PlanCost, tuple_size: f32) -> PlanCost {
        PlanCost {
            tuple_size,
            cpu_cost: child.cpu_cost + child.num_tuples * self.tuple_cost,
            ..*child
        }
    }

    /// In-memory sort of `child`.
    #[must_use]
    pub fn sort(&self, child: &PlanCost) -> PlanCost {
        let n = child.num_tuples.max(1.0);
        PlanCost { cpu_cost: child.cpu_cost + self.sort_cost_factor * n * n.log2(), ..*child }
    }

    /// LIMIT / OFFSET over `child`.
    #[must_use]
    pub fn limit(&self, child: &PlanCost, limit: Option<u64>, offset: u64) -> PlanCost {
        let available = (child.num_tuples - offset as f32).max(0.0);
        let num_tuples = limit.map_or(available, |l| available.min(l as f32));
        PlanCost { num_tuples, ..*child }
    }

    /// Grouping of `child` into `groups` output rows.
    #[must_use]
    pub fn aggregate(&self, child: &PlanCost, groups: f32, tuple_size: f32) -> PlanCost {
        PlanCost {
            num_tuples: groups,
            tuple_size,
            cpu_cost: child.cpu_cost + child.num_tuples * self.tuple_cost,
            num_block_ios: child.num_block_ios,
        }
    }

    /// Nested-loops join: the right subtree is rescanned once per left row.
    #[must_use]
    pub fn nested_loop(
        &self,
        left: &PlanCost,
        right: &PlanCost,
        join_type: JoinType,
        selectivity: f32,
    ) -> PlanCost {
        let pairs = left.num_tuples * right.num_tuples;
        let matched = pairs * selectivity;
        let semi = matched.min(left.num_tuples);
        let (num_tuples, tuple_size) = match join_type {
            JoinType::Inner | JoinType::Cross => (matched, left.tuple_size + right.tuple_size),
            JoinType::LeftOuter => (matched.max(left.num_tuples), left.tuple_size + right.tuple_size),
            JoinType::RightOuter => (matched.max(right.num_tuples), left.tuple_size + right.tuple_size),
            JoinType::FullOuter => (
                matched.max(left.num_tuples).max(right.num_tuples),
                left.tuple_size + right.tuple_size,
            ),
            JoinType::Semijoin => (semi, left.tuple_size),
            JoinType::Antijoin => (left.num_tuples - semi, left.tuple_size),
        };
        PlanCost {
            num_tuples,
            tuple_size,
            cpu_cost: left.cpu_cost
                + left.num_tuples * right.cpu_cost
                + pairs * self.tuple_cost,
            num_block_ios: left.num_block_ios
                + (left.num_tuples.max(0.0) as u64).saturating_mul(right.num_block_ios),
        }
    }
}
