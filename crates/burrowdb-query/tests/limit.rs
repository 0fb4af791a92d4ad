//! LIMIT and OFFSET through the planner.

mod common;

use burrowdb_query::ast::{FromClause, OrderByExpr, SelectClause, SelectValue};
use burrowdb_query::expr::Expr;
use burrowdb_query::storage::MemoryStorage;
use common::{create_table, init_tracing, rows, run};
use proptest::prelude::*;

fn limit_storage() -> MemoryStorage {
    init_tracing();
    let storage = MemoryStorage::new();
    create_table(&storage, "test_limit", &["a", "b"], &[&[0, 0], &[10, 1], &[20, 2], &[30, 3]]);
    storage
}

fn select_all() -> SelectClause {
    SelectClause::select_all(FromClause::table("test_limit"))
}

#[test]
fn limit_returns_leading_rows() {
    let storage = limit_storage();
    assert_eq!(
        run(&storage, &select_all().limit(2)),
        rows(&[&[Some(0), Some(0)], &[Some(10), Some(1)]])
    );
    assert_eq!(run(&storage, &select_all().limit(4)).len(), 4);
    assert_eq!(run(&storage, &select_all().limit(100)).len(), 4);
    assert_eq!(storage.pinned_pages().expect("pins"), 0);
}

#[test]
fn limit_zero_returns_nothing() {
    let storage = limit_storage();
    assert!(run(&storage, &select_all().limit(0)).is_empty());
}

#[test]
fn offset_skips_rows() {
    let storage = limit_storage();
    assert_eq!(
        run(&storage, &select_all().offset(1).limit(2)),
        rows(&[&[Some(10), Some(1)], &[Some(20), Some(2)]])
    );
    assert_eq!(run(&storage, &select_all().offset(3)), rows(&[&[Some(30), Some(3)]]));
    assert!(run(&storage, &select_all().offset(10)).is_empty());
}

#[test]
fn limit_applies_after_ordering_and_filtering() {
    let storage = limit_storage();
    let ordered = select_all().order_by(vec![OrderByExpr::desc(Expr::column("a"))]).limit(2);
    assert_eq!(run(&storage, &ordered), rows(&[&[Some(30), Some(3)], &[Some(20), Some(2)]]));

    let filtered = SelectClause::new(vec![SelectValue::expr(Expr::column("b"))])
        .from(FromClause::table("test_limit"))
        .where_clause(Expr::column("a").gt(Expr::literal(0)))
        .offset(1)
        .limit(1);
    assert_eq!(run(&storage, &filtered), rows(&[&[Some(2)]]));
    assert_eq!(storage.pinned_pages().expect("pins"), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn limit_offset_window(n in 0usize..12, limit in 0u64..15, offset in 0u64..15) {
        let storage = MemoryStorage::new();
        let values: Vec<Vec<i64>> = (0..n as i64).map(|i| vec![i, i * 10]).collect();
        let slices: Vec<&[i64]> = values.iter().map(Vec::as_slice).collect();
        create_table(&storage, "test_limit", &["a", "b"], &slices);

        let result = run(&storage, &select_all().offset(offset).limit(limit));
        let start = (offset as usize).min(n);
        let expected = (n - start).min(limit as usize);
        prop_assert_eq!(result.len(), expected);
        if let Some(first) = result.first() {
            prop_assert_eq!(first[0].as_int(), Some(start as i64));
        }
        prop_assert_eq!(storage.pinned_pages().unwrap(), 0);
    }
}
