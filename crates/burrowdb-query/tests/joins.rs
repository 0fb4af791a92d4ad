//! Join planning and execution through the planner.

mod common;

use burrowdb_query::ast::{FromClause, JoinCondition, JoinType, SelectClause};
use burrowdb_query::exec::collect_tuples;
use burrowdb_query::expr::Expr;
use burrowdb_query::plan::{Planner, PlannerConfig};
use burrowdb_query::storage::MemoryStorage;
use burrowdb_query::QueryError;
use common::{create_table, join_storage, rows, run, try_run};
use proptest::prelude::*;

fn on_b() -> JoinCondition {
    JoinCondition::On(Expr::qualified_column("test_joins_1", "b").eq(Expr::qualified_column("test_joins_2", "b")))
}

fn join(left: &str, right: &str, join_type: JoinType, condition: JoinCondition) -> SelectClause {
    SelectClause::select_all(FromClause::table(left).join(FromClause::table(right), join_type, condition))
}

fn column_names(storage: &MemoryStorage, select: &SelectClause) -> Vec<String> {
    let planner = Planner::new(storage, PlannerConfig::new());
    let plan = planner.make_plan(select, &[]).expect("plan");
    plan.schema().columns().iter().map(|c| c.name.clone()).collect()
}

// ============================================================================
// ON conditions
// ============================================================================

#[test]
fn inner_join_on() {
    let storage = join_storage();
    let result = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::Inner, on_b()));
    assert_eq!(
        result,
        rows(&[
            &[Some(10), Some(1), Some(1), Some(100)],
            &[Some(20), Some(2), Some(2), Some(200)],
            &[Some(30), Some(3), Some(3), Some(300)],
        ])
    );
    assert_eq!(storage.pinned_pages().expect("pins"), 0);
}

#[test]
fn left_outer_join_pads_unmatched_left_rows() {
    let storage = join_storage();
    let result = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::LeftOuter, on_b()));
    assert_eq!(
        result,
        rows(&[
            &[Some(10), Some(1), Some(1), Some(100)],
            &[Some(20), Some(2), Some(2), Some(200)],
            &[Some(30), Some(3), Some(3), Some(300)],
            &[Some(40), Some(4), None, None],
        ])
    );
}

#[test]
fn right_outer_join_keeps_column_order() {
    let storage = join_storage();
    let select = join("test_joins_1", "test_joins_2", JoinType::RightOuter, on_b());
    assert_eq!(column_names(&storage, &select), vec!["a", "b", "b", "c"]);
    assert_eq!(
        run(&storage, &select),
        rows(&[
            &[Some(10), Some(1), Some(1), Some(100)],
            &[Some(20), Some(2), Some(2), Some(200)],
            &[Some(30), Some(3), Some(3), Some(300)],
            &[None, None, Some(5), Some(500)],
        ])
    );
}

#[test]
fn full_outer_join_emits_unmatched_rows_from_both_sides() {
    let storage = join_storage();
    let result = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::FullOuter, on_b()));
    assert_eq!(
        result,
        rows(&[
            &[Some(10), Some(1), Some(1), Some(100)],
            &[Some(20), Some(2), Some(2), Some(200)],
            &[Some(30), Some(3), Some(3), Some(300)],
            &[Some(40), Some(4), None, None],
            &[None, None, Some(5), Some(500)],
        ])
    );
}

#[test]
fn full_outer_join_with_empty_left() {
    let storage = join_storage();
    let on = JoinCondition::On(Expr::qualified_column("test_empty_1", "b").eq(Expr::qualified_column("test_joins_2", "b")));
    let result = run(&storage, &join("test_empty_1", "test_joins_2", JoinType::FullOuter, on));
    assert_eq!(
        result,
        rows(&[
            &[None, None, Some(1), Some(100)],
            &[None, None, Some(2), Some(200)],
            &[None, None, Some(3), Some(300)],
            &[None, None, Some(5), Some(500)],
        ])
    );
}

#[test]
fn semijoin_and_antijoin_return_left_columns() {
    let storage = join_storage();
    let semi = join("test_joins_1", "test_joins_2", JoinType::Semijoin, on_b());
    assert_eq!(column_names(&storage, &semi), vec!["a", "b"]);
    assert_eq!(
        run(&storage, &semi),
        rows(&[&[Some(10), Some(1)], &[Some(20), Some(2)], &[Some(30), Some(3)]])
    );

    let anti = join("test_joins_1", "test_joins_2", JoinType::Antijoin, on_b());
    assert_eq!(run(&storage, &anti), rows(&[&[Some(40), Some(4)]]));
}

#[test]
fn antijoin_against_empty_table_returns_every_left_row() {
    let storage = join_storage();
    let anti = join("test_joins_1", "test_empty_2", JoinType::Antijoin, JoinCondition::None);
    assert_eq!(run(&storage, &anti).len(), 4);
    let semi = join("test_joins_1", "test_empty_2", JoinType::Semijoin, JoinCondition::None);
    assert!(run(&storage, &semi).is_empty());
}

#[test]
fn cross_join_produces_every_pair() {
    let storage = join_storage();
    let result = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::Cross, JoinCondition::None));
    assert_eq!(result.len(), 16);
    assert_eq!(result[1], rows(&[&[Some(10), Some(1), Some(2), Some(200)]])[0]);
}

#[test]
fn aliased_tables_join_on_aliases() {
    let storage = join_storage();
    let select = SelectClause::select_all(FromClause::aliased("test_joins_1", "l").join(
        FromClause::aliased("test_joins_2", "r"),
        JoinType::Inner,
        JoinCondition::On(Expr::qualified_column("l", "b").eq(Expr::qualified_column("r", "b"))),
    ))
    .where_clause(Expr::qualified_column("r", "c").gt(Expr::literal(100)));
    assert_eq!(
        run(&storage, &select),
        rows(&[&[Some(20), Some(2), Some(2), Some(200)], &[Some(30), Some(3), Some(3), Some(300)]])
    );
}

#[test]
fn aggregate_in_on_clause_is_rejected() {
    let storage = join_storage();
    let on = JoinCondition::On(Expr::count_star().gt(Expr::literal(1)));
    let err = try_run(&storage, &join("test_joins_1", "test_joins_2", JoinType::Inner, on)).unwrap_err();
    assert!(matches!(err, QueryError::IllegalAggregatePlacement(_)));
    assert!(err.to_string().contains("ON"));
}

// ============================================================================
// USING and NATURAL
// ============================================================================

#[test]
fn using_lists_shared_column_once() {
    let storage = join_storage();
    let select = join("test_joins_1", "test_joins_2", JoinType::Inner, JoinCondition::Using(vec!["b".to_string()]));
    assert_eq!(column_names(&storage, &select), vec!["b", "a", "c"]);
    assert_eq!(
        run(&storage, &select),
        rows(&[
            &[Some(1), Some(10), Some(100)],
            &[Some(2), Some(20), Some(200)],
            &[Some(3), Some(30), Some(300)],
        ])
    );
}

#[test]
fn outer_using_takes_shared_value_from_preserved_side() {
    let storage = join_storage();
    let using = || JoinCondition::Using(vec!["b".to_string()]);

    let left = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::LeftOuter, using()));
    assert_eq!(left[3], rows(&[&[Some(4), Some(40), None]])[0]);

    let right = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::RightOuter, using()));
    assert_eq!(right.len(), 4);
    assert_eq!(right[3], rows(&[&[Some(5), None, Some(500)]])[0]);

    let full = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::FullOuter, using()));
    assert_eq!(
        full,
        rows(&[
            &[Some(1), Some(10), Some(100)],
            &[Some(2), Some(20), Some(200)],
            &[Some(3), Some(30), Some(300)],
            &[Some(4), Some(40), None],
            &[Some(5), None, Some(500)],
        ])
    );
}

#[test]
fn using_rejects_unknown_column() {
    let storage = join_storage();
    let select = join("test_joins_1", "test_joins_2", JoinType::Inner, JoinCondition::Using(vec!["c".to_string()]));
    let err = try_run(&storage, &select).unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
    assert!(err.to_string().contains("left"));
}

#[test]
fn natural_join_matches_using() {
    let storage = join_storage();
    let natural = run(&storage, &join("test_joins_1", "test_joins_2", JoinType::Inner, JoinCondition::Natural));
    let using = run(
        &storage,
        &join("test_joins_1", "test_joins_2", JoinType::Inner, JoinCondition::Using(vec!["b".to_string()])),
    );
    assert_eq!(natural, using);
}

#[test]
fn natural_join_with_empty_side() {
    let storage = join_storage();

    let empty_right = join("test_joins_1", "test_empty_2", JoinType::Inner, JoinCondition::Natural);
    assert_eq!(column_names(&storage, &empty_right), vec!["b", "a", "c"]);
    assert!(run(&storage, &empty_right).is_empty());

    let empty_left = join("test_empty_1", "test_joins_2", JoinType::Inner, JoinCondition::Natural);
    assert!(run(&storage, &empty_left).is_empty());

    let padded = run(&storage, &join("test_joins_1", "test_empty_2", JoinType::LeftOuter, JoinCondition::Natural));
    assert_eq!(
        padded,
        rows(&[
            &[Some(1), Some(10), None],
            &[Some(2), Some(20), None],
            &[Some(3), Some(30), None],
            &[Some(4), Some(40), None],
        ])
    );
    assert_eq!(storage.pinned_pages().expect("pins"), 0);
}

#[test]
fn natural_join_without_common_columns_is_a_cross_join() {
    let storage = join_storage();
    let select = join("test_joins_1", "test_other", JoinType::Inner, JoinCondition::Natural);
    assert_eq!(column_names(&storage, &select), vec!["a", "b", "x"]);
    assert_eq!(run(&storage, &select).len(), 8);
}

#[test]
fn joined_subqueries_are_renamed() {
    let storage = join_storage();
    let small = SelectClause::select_all(FromClause::table("test_joins_2")).where_clause(Expr::column("c").lt(Expr::literal(300)));
    let select = SelectClause::select_all(FromClause::table("test_joins_1").join(
        FromClause::subquery(small, "s"),
        JoinType::Inner,
        JoinCondition::On(Expr::qualified_column("test_joins_1", "b").eq(Expr::qualified_column("s", "b"))),
    ));
    assert_eq!(
        run(&storage, &select),
        rows(&[&[Some(10), Some(1), Some(1), Some(100)], &[Some(20), Some(2), Some(2), Some(200)]])
    );
}

#[test]
fn join_plans_can_be_rerun() {
    let storage = join_storage();
    let planner = Planner::new(&storage, PlannerConfig::new());
    let mut plan = planner
        .make_plan(&join("test_joins_1", "test_joins_2", JoinType::FullOuter, on_b()), &[])
        .expect("plan");
    let first = collect_tuples(plan.as_mut()).expect("first run");
    let second = collect_tuples(plan.as_mut()).expect("second run");
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
}

// ============================================================================
// Cardinality properties
// ============================================================================

fn storage_for(left: &[i64], right: &[i64]) -> MemoryStorage {
    let storage = MemoryStorage::new();
    let left_rows: Vec<Vec<i64>> = left.iter().enumerate().map(|(i, b)| vec![i as i64, *b]).collect();
    let right_rows: Vec<Vec<i64>> = right.iter().enumerate().map(|(i, b)| vec![*b, i as i64]).collect();
    fn as_slices(rows: &[Vec<i64>]) -> Vec<&[i64]> {
        rows.iter().map(Vec::as_slice).collect()
    }
    create_table(&storage, "test_joins_1", &["a", "b"], &as_slices(&left_rows));
    create_table(&storage, "test_joins_2", &["b", "c"], &as_slices(&right_rows));
    storage
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn join_cardinalities(
        left in prop::collection::vec(0i64..5, 0..8),
        right in prop::collection::vec(0i64..5, 0..8),
    ) {
        let storage = storage_for(&left, &right);
        let count = |join_type| run(&storage, &join("test_joins_1", "test_joins_2", join_type, on_b())).len();

        let pairs = left.iter().map(|l| right.iter().filter(|r| *r == l).count()).sum::<usize>();
        let unmatched_left = left.iter().filter(|l| !right.contains(l)).count();
        let unmatched_right = right.iter().filter(|r| !left.contains(r)).count();

        prop_assert_eq!(count(JoinType::Inner), pairs);
        prop_assert_eq!(count(JoinType::LeftOuter), pairs + unmatched_left);
        prop_assert_eq!(count(JoinType::RightOuter), pairs + unmatched_right);
        prop_assert_eq!(count(JoinType::FullOuter), pairs + unmatched_left + unmatched_right);
        prop_assert_eq!(count(JoinType::Semijoin) + count(JoinType::Antijoin), left.len());
        prop_assert_eq!(count(JoinType::Antijoin), unmatched_left);
        prop_assert_eq!(storage.pinned_pages().unwrap(), 0);
    }
}
