//! Hash-based grouping and aggregation.

use std::collections::{HashMap, HashSet};
use std::fmt;

use burrowdb_core::Value;
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::exec::node::{no_mark, BoxedNode, NodeBase, OperationType, PlanNode};
use crate::exec::{ColumnInfo, Schema, Tuple};
use crate::expr::{AggregateFunction, Environment, Expr};
use crate::plan::{ColumnStats, GroupAggregates};

/// Running state of one aggregate call within one group.
#[derive(Debug, Clone)]
struct Accumulator {
    func: AggregateFunction,
    /// `None` for `COUNT(*)`.
    arg: Option<Expr>,
    distinct: bool,
    seen: HashSet<Vec<u8>>,
    count: i64,
    sum: Option<Value>,
    extreme: Option<Value>,
}

impl Accumulator {
    fn new(aggregate: &Expr) -> QueryResult<Self> {
        let Expr::Aggregate { func, arg, distinct } = aggregate else {
            return Err(QueryError::invalid_state(format!("{aggregate} is not an aggregate call")));
        };
        Ok(Self {
            func: *func,
            arg: arg.as_deref().cloned(),
            distinct: *distinct,
            seen: HashSet::new(),
            count: 0,
            sum: None,
            extreme: None,
        })
    }

    fn update(&mut self, env: &Environment<'_>) -> QueryResult<()> {
        let Some(arg) = &self.arg else {
            self.count += 1;
            return Ok(());
        };
        let value = arg.evaluate(env)?;
        if value.is_null() {
            return Ok(());
        }
        if self.distinct && !self.seen.insert(encode_key(std::slice::from_ref(&value))) {
            return Ok(());
        }
        self.count += 1;
        match self.func {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => {
                self.sum = Some(match self.sum.take() {
                    None => numeric(value, self.func)?,
                    Some(total) => add(total, value, self.func)?,
                });
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let replace = self.extreme.as_ref().map_or(true, |current| {
                    let ordering = value.total_cmp(current);
                    if self.func == AggregateFunction::Min {
                        ordering.is_lt()
                    } else {
                        ordering.is_gt()
                    }
                });
                if replace {
                    self.extreme = Some(value);
                }
            }
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        match self.func {
            AggregateFunction::Count => Value::Int(self.count),
            AggregateFunction::Sum => self.sum.clone().unwrap_or(Value::Null),
            AggregateFunction::Avg => match self.sum.as_ref().and_then(Value::to_f64) {
                Some(total) if self.count > 0 => Value::Float(total / self.count as f64),
                _ => Value::Null,
            },
            AggregateFunction::Min | AggregateFunction::Max => {
                self.extreme.clone().unwrap_or(Value::Null)
            }
        }
    }
}

fn numeric(value: Value, func: AggregateFunction) -> QueryResult<Value> {
    if value.is_numeric() {
        Ok(value)
    } else {
        Err(QueryError::evaluation(format!("{func} cannot be applied to {}", value.type_name())))
    }
}

fn add(total: Value, value: Value, func: AggregateFunction) -> QueryResult<Value> {
    match (total, numeric(value, func)?) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(b)
            .map(Value::Int)
            .ok_or_else(|| QueryError::evaluation(format!("integer overflow in {func}"))),
        (a, b) => match (a.to_f64(), b.to_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(QueryError::evaluation(format!("{func} cannot be applied to non-numeric values"))),
        },
    }
}

/// Encodes group-by values into a hashable byte key.
///
/// Values of different types never collide; `-0.0` and `0.0` share a key.
fn encode_key(values: &[Value]) -> Vec<u8> {
    let mut key = Vec::new();
    for value in values {
        match value {
            Value::Null => key.push(0),
            Value::Bool(b) => key.extend([1, u8::from(*b)]),
            Value::Int(i) => {
                key.push(2);
                key.extend(i.to_be_bytes());
            }
            Value::Float(f) => {
                key.push(3);
                let normalized = if *f == 0.0 { 0.0_f64 } else { *f };
                key.extend(normalized.to_bits().to_be_bytes());
            }
            Value::String(s) => {
                key.push(4);
                key.extend((s.len() as u64).to_be_bytes());
                key.extend(s.as_bytes());
            }
        }
    }
    key
}

struct Group {
    keys: Vec<Value>,
    accumulators: Vec<Accumulator>,
}

/// Groups its child's tuples and computes aggregates per group.
///
/// Output columns are the group-by expressions followed by one column per
/// aggregate, named by its key in [`GroupAggregates`]. Groups come out in
/// order of first appearance. Without GROUP BY an empty input still
/// produces one row (`COUNT` = 0, other aggregates NULL).
pub struct HashedGroupAggregateNode {
    base: NodeBase,
    group_by: Vec<Expr>,
    aggregates: GroupAggregates,
    child: BoxedNode,
    rows: Vec<Tuple>,
    loaded: bool,
    position: usize,
    mark: Option<usize>,
}

impl HashedGroupAggregateNode {
    /// Creates a grouping node over `child`.
    #[must_use]
    pub fn new(group_by: Vec<Expr>, aggregates: GroupAggregates, child: BoxedNode) -> Self {
        Self {
            base: NodeBase::new(),
            group_by,
            aggregates,
            child,
            rows: Vec::new(),
            loaded: false,
            position: 0,
            mark: None,
        }
    }

    /// Returns the group-by expressions.
    #[must_use]
    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    /// Returns the aggregates this node computes.
    #[must_use]
    pub const fn aggregates(&self) -> &GroupAggregates {
        &self.aggregates
    }

    fn new_accumulators(&self) -> QueryResult<Vec<Accumulator>> {
        self.aggregates.values().map(Accumulator::new).collect()
    }

    fn load(&mut self) -> QueryResult<()> {
        let schema = self.child.schema();
        let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();
        while let Some(tuple) = self.child.next_tuple()? {
            let env = Environment::with_tuple(&schema, tuple.values());
            let keys = self.group_by.iter().map(|e| e.evaluate(&env)).collect::<QueryResult<Vec<_>>>()?;
            let encoded = encode_key(&keys);
            let slot = match index.get(&encoded) {
                Some(&slot) => slot,
                None => {
                    index.insert(encoded, groups.len());
                    groups.push(Group { keys, accumulators: self.new_accumulators()? });
                    groups.len() - 1
                }
            };
            if let Some(group) = groups.get_mut(slot) {
                for accumulator in &mut group.accumulators {
                    accumulator.update(&env)?;
                }
            }
        }
        if groups.is_empty() && self.group_by.is_empty() {
            groups.push(Group { keys: Vec::new(), accumulators: self.new_accumulators()? });
        }
        debug!(groups = groups.len(), aggregates = self.aggregates.len(), "grouped input");
        self.rows = groups
            .into_iter()
            .map(|group| {
                let mut values = group.keys;
                values.extend(group.accumulators.iter().map(Accumulator::finish));
                Tuple::new(values)
            })
            .collect();
        self.loaded = true;
        Ok(())
    }

    fn estimate_groups(&self, input_rows: f32) -> f32 {
        if self.group_by.is_empty() {
            return 1.0;
        }
        let schema = self.child.schema();
        let stats = self.child.column_stats();
        let distinct: Option<f32> = self
            .group_by
            .iter()
            .map(|expr| {
                let index = schema.column_index(expr.as_column()?).ok()?;
                stats.get(index)?.num_unique_values.map(|n| n as f32)
            })
            .product();
        distinct.map_or(input_rows, |d| d.min(input_rows))
    }
}

impl PlanNode for HashedGroupAggregateNode {
    fn operation_type(&self) -> OperationType {
        OperationType::GroupAggregate
    }

    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        vec![self.child.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        vec![self.child.as_mut()]
    }

    fn prepare(&mut self) -> QueryResult<()> {
        self.child.prepare()?;
        let input = self.child.schema();
        for aggregate in self.aggregates.values() {
            if !aggregate.is_aggregate() {
                return Err(QueryError::invalid_state(format!("{aggregate} is not an aggregate call")));
            }
        }

        let mut columns = Vec::with_capacity(self.group_by.len() + self.aggregates.len());
        let mut stats = Vec::with_capacity(columns.capacity());
        for expr in &self.group_by {
            match expr.as_column() {
                Some(name) => {
                    let index = input.column_index(name)?;
                    columns.extend(input.column_info(index).cloned());
                    stats.push(self.child.column_stats().get(index).cloned().unwrap_or_else(ColumnStats::unknown));
                }
                None => {
                    for name in expr.columns() {
                        input.column_index(name)?;
                    }
                    columns.push(ColumnInfo::new(expr.to_string(), None, expr.sql_type(&input)));
                    stats.push(ColumnStats::unknown());
                }
            }
        }
        for (key, aggregate) in &self.aggregates {
            for name in aggregate.columns() {
                input.column_index(name)?;
            }
            columns.push(ColumnInfo::new(key.clone(), None, aggregate.sql_type(&input)));
            stats.push(ColumnStats::unknown());
        }

        let schema = Schema::new(columns);
        let child_cost = self.child.cost().unwrap_or_default();
        let groups = self.estimate_groups(child_cost.num_tuples);
        let cost = self.base.config().cost_model.aggregate(&child_cost, groups, schema.tuple_size());
        self.base.set_prepared(schema, cost, stats);
        Ok(())
    }

    fn initialize(&mut self) -> QueryResult<()> {
        self.base.ensure_prepared(self.operation_type())?;
        self.base.reset_tuples_produced();
        self.rows.clear();
        self.loaded = false;
        self.position = 0;
        self.child.initialize()
    }

    fn next_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.loaded {
            self.load()?;
        }
        let Some(tuple) = self.rows.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        self.base.inc_tuples_produced();
        Ok(Some(tuple.clone()))
    }

    fn clean_up(&mut self) -> QueryResult<()> {
        self.rows = Vec::new();
        self.loaded = false;
        self.child.clean_up()
    }

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark_current_position(&mut self) -> QueryResult<()> {
        self.mark = Some(self.position);
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> QueryResult<()> {
        self.position = self.mark.ok_or_else(|| no_mark(self.operation_type()))?;
        Ok(())
    }

    fn duplicate(&self) -> BoxedNode {
        let mut copy = Self::new(self.group_by.clone(), self.aggregates.clone(), self.child.duplicate());
        copy.base = self.base.fresh();
        Box::new(copy)
    }
}

impl fmt::Display for HashedGroupAggregateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedGroupAggregate[groupBy=[")?;
        for (i, expr) in self.group_by.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{expr}")?;
        }
        write!(f, "], aggregates=[")?;
        for (i, key) in self.aggregates.keys().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "]]")
    }
}
