//! Sequential table scan.

use std::fmt;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::node::{no_mark, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::Tuple;
use crate::expr::{Environment, Expr};
use crate::plan::{estimate_selectivity, TableStats};
use crate::storage::{MemoryTable, TableInfo};

/// Reads every live row of a table in page/slot order, optionally filtering.
///
/// Produced tuples carry their storage location and a pin on their page.
pub struct FileScanNode {
    base: NodeBase,
    table_name: String,
    table: Arc<MemoryTable>,
    stats: TableStats,
    predicate: Option<Expr>,
    /// Next `(page, slot)` to read.
    position: (usize, usize),
    done: bool,
    mark: Option<((usize, usize), bool)>,
}

impl FileScanNode {
    /// Creates a scan over `info`, keeping rows that satisfy `predicate`.
    #[must_use]
    pub fn new(info: TableInfo, predicate: Option<Expr>) -> Self {
        Self {
            base: NodeBase::new(),
            table_name: info.name,
            table: info.table,
            stats: info.stats,
            predicate,
            position: (0, 0),
            done: false,
            mark: None,
        }
    }

    /// Returns the scanned table's name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the scan predicate.
    #[must_use]
    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    fn accepts(&self, tuple: &Tuple) -> QueryResult<bool> {
        match &self.predicate {
            None => Ok(true),
            Some(predicate) => {
                let schema = self.base.schema();
                predicate.evaluate_predicate(&Environment::with_tuple(&schema, tuple.values()))
            }
        }
    }
}

impl PlanNode for FileScanNode {
    fn operation_type(&self) -> OperationType {
        OperationType::FileScan
    }

    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn prepare(&mut self) -> QueryResult<()> {
        let schema = self.table.schema();
        let config = self.base.config();
        let selectivity = self.predicate.as_ref().map_or(1.0, |p| {
            estimate_selectivity(p, &schema, &self.stats.column_stats, &config.selectivity)
        });
        let cost = config.cost_model.file_scan(&self.stats, selectivity);
        let stats = self.stats.column_stats.clone();
        self.base.set_prepared(schema.as_ref().clone(), cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.position = (0, 0);
        self.done = false;
        Ok(())
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        while !self.done {
            let (page, slot) = self.position;
            let Some(tuple) = self.table.read_from(page, slot)? else {
                self.done = true;
                break;
            };
            if let Some(location) = tuple.location() {
                self.position = (location.page, location.slot + 1);
            }
            if self.accepts(&tuple)? {
                self.base.inc_tuples_produced();
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark_current_position(&mut self) -> QueryResult<()> {
        self.mark = Some((self.position, self.done));
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> QueryResult<()> {
        let (position, done) = self.mark.ok_or_else(|| no_mark(self.operation_type()))?;
        self.position = position;
        self.done = done;
        Ok(())
    }

    fn duplicate(&self) -> BoxedNode {
        Box::new(Self {
            base: self.base.fresh(),
            table_name: self.table_name.clone(),
            table: Arc::clone(&self.table),
            stats: self.stats.clone(),
            predicate: self.predicate.clone(),
            position: (0, 0),
            done: false,
            mark: None,
        })
    }
}

impl fmt::Display for FileScanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(predicate) => write!(f, "FileScan[table: {}, pred: {predicate}]", self.table_name),
            None => write!(f, "FileScan[table: {}]", self.table_name),
        }
    }
}
