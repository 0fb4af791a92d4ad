//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use burrowdb_core::{SqlType, Value};
use burrowdb_query::ast::SelectClause;
use burrowdb_query::exec::collect_tuples;
use burrowdb_query::plan::{Planner, PlannerConfig};
use burrowdb_query::storage::MemoryStorage;
use burrowdb_query::QueryResult;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Creates an INTEGER table, fills it and analyzes it.
pub fn create_table(storage: &MemoryStorage, name: &str, columns: &[&str], rows: &[&[i64]]) {
    let columns: Vec<(&str, SqlType)> = columns.iter().map(|c| (*c, SqlType::Integer)).collect();
    storage.create_table(name, &columns).expect("create table");
    for row in rows {
        storage.insert(name, row.iter().map(|v| Value::Int(*v)).collect()).expect("insert");
    }
    storage.analyze(name).expect("analyze");
}

/// The two join fixtures plus empty tables with the same layouts.
pub fn join_storage() -> MemoryStorage {
    init_tracing();
    let storage = MemoryStorage::new();
    create_table(&storage, "test_joins_1", &["a", "b"], &[&[10, 1], &[20, 2], &[30, 3], &[40, 4]]);
    create_table(&storage, "test_joins_2", &["b", "c"], &[&[1, 100], &[2, 200], &[3, 300], &[5, 500]]);
    create_table(&storage, "test_empty_1", &["a", "b"], &[]);
    create_table(&storage, "test_empty_2", &["b", "c"], &[]);
    create_table(&storage, "test_other", &["x"], &[&[7], &[8]]);
    storage
}

/// Plans and runs `select`, returning the row values.
pub fn try_run(storage: &MemoryStorage, select: &SelectClause) -> QueryResult<Vec<Vec<Value>>> {
    let planner = Planner::new(storage, PlannerConfig::new());
    let mut plan = planner.make_plan(select, &[])?;
    Ok(collect_tuples(plan.as_mut())?.into_iter().map(|t| t.into_values()).collect())
}

/// Like [`try_run`], panicking on error.
pub fn run(storage: &MemoryStorage, select: &SelectClause) -> Vec<Vec<Value>> {
    try_run(storage, select).expect("query failed")
}

/// Builds expected rows; `None` is NULL.
pub fn rows(rows: &[&[Option<i64>]]) -> Vec<Vec<Value>> {
    rows.iter().map(|r| r.iter().map(|v| Value::from(*v)).collect()).collect()
}
