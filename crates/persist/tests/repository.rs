//! Integration tests for repository operations and differential updates.
//!
//! Statements are captured by a recording session so each test can check what
//! reached the database.

#![allow(missing_docs, clippy::float_cmp)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{
    Event, Order, OrderLine, OrderLineKey, RecordingSession, assert_sql_contains, database,
    database_with, order_row, row,
};
use omnia_persist::{
    Cond, Criteria, CrudRepository, DataSource, DataType, ErrorCode, Executor, Fields, Hooks,
    OrderBy, Page, Params, Payload, Postgres, ShardContext, StateWrapper, UpdateOutcome, describe,
};
use serde_json::json;

fn count_row(count: i64) -> Vec<omnia_persist::Row> {
    vec![row(&[("COUNT(*)", DataType::Int64(Some(count)))])]
}

#[derive(Default)]
struct Guard {
    updates_checked: AtomicUsize,
}

impl Hooks<Order> for Guard {
    fn before_create(
        &self, _source: &DataSource, record: &mut Order, _payload: &dyn Payload,
    ) -> Result<(), ErrorCode> {
        if record.user_name == "mallory" {
            return Err(ErrorCode::new(-1, "blocked user"));
        }
        Ok(())
    }

    fn before_update(
        &self, _source: &DataSource, record: &mut Order, _payload: &dyn Payload,
    ) -> Result<(), ErrorCode> {
        self.updates_checked.fetch_add(1, Ordering::SeqCst);
        if record.total_amount < 0.0 {
            return Err(ErrorCode::new(-2, "negative total"));
        }
        Ok(())
    }
}

// create

#[test]
fn create_fills_generated_key() {
    let session = RecordingSession::new();
    let orders = CrudRepository::<Order>::new(database(&session));

    let saved = orders
        .create(None, &json!({"userName": "bob", "totalAmount": 12.5}), &Fields::new(), None)
        .unwrap();

    assert!(saved.outcome.is_success());
    assert_eq!(saved.outcome.get("id"), Some(&json!(1)));
    let order = saved.record.unwrap();
    assert_eq!(order.order_id, 1);
    assert_eq!(order.user_name, "bob");
    assert_eq!(order.total_amount, 12.5);
    assert_eq!(describe::<Order>().unwrap().autoincrement_keys(), ["orderId"]);

    let statements = session.statements();
    assert_eq!(statements.len(), 1);
    assert_sql_contains(
        &statements[0].sql,
        &["INSERT INTO orders", "user_name, total_amount, status, discount"],
    );
    assert_eq!(statements[0].params[0], DataType::Str(Some("bob".to_string())));
    assert_eq!(statements[0].params[1], DataType::Double(Some(12.5)));
}

#[test]
fn create_returns_sequence_key() {
    let session = RecordingSession::new();
    session.returning(vec![row(&[("event_id", DataType::Int64(Some(41)))])]);
    let events = CrudRepository::<Event>::new(database_with(&session, Arc::new(Postgres)));

    let shard = ShardContext::new(2024);
    let payload = json!({"kind": "login"});
    let saved = events.create(None, &payload, &Fields::new(), Some(&shard)).unwrap();

    assert_eq!(saved.outcome.get("id"), Some(&json!(41)));
    assert_eq!(saved.record.unwrap().event_id, 41);

    let statements = session.statements();
    assert_eq!(statements.len(), 1);
    assert_sql_contains(
        &statements[0].sql,
        &[
            "INSERT INTO events_2024",
            "event_id, kind",
            "VALUES nextval'events_seq', $1",
            "RETURNING event_id",
        ],
    );
    assert_eq!(statements[0].params, vec![DataType::Str(Some("login".to_string()))]);
}

#[test]
fn vetoed_create_issues_nothing() {
    let session = RecordingSession::new();
    let orders = CrudRepository::with_hooks(database(&session), Guard::default());

    let saved = orders.create(None, &json!({"userName": "mallory"}), &Fields::new(), None).unwrap();

    assert!(!saved.outcome.is_success());
    assert_eq!(saved.outcome.code(), -1);
    assert_eq!(saved.outcome.message(), Some("blocked user"));
    assert!(saved.record.is_none());
    assert!(session.statements().is_empty());
}

// update

#[test]
fn update_touches_only_changed_columns() {
    let session = RecordingSession::new();
    session.returning(vec![order_row(7, "bob", 12.5)]);
    let orders = CrudRepository::with_hooks(database(&session), Guard::default());

    let payload = json!({"totalAmount": 20.0});
    let saved = orders.update(None, &7_i64, &payload, &Fields::new(), false, None).unwrap();

    assert_eq!(saved.outcome.effect_count(), 1);
    assert_eq!(orders.hooks().updates_checked.load(Ordering::SeqCst), 1);
    assert_eq!(saved.record.unwrap().total_amount, 20.0);

    let statements = session.statements();
    assert_eq!(statements.len(), 2);
    assert_sql_contains(&statements[0].sql, &["SELECT", "FROM orders", "WHERE order_id = ?"]);
    assert_eq!(
        canonical(&statements[1].sql),
        "UPDATE orders SET total_amount = ? WHERE order_id = ?"
    );
    assert_eq!(statements[1].params, vec![DataType::Double(Some(20.0)), DataType::Int64(Some(7))]);
}

#[test]
fn update_without_changes_skips_hook_and_statement() {
    let session = RecordingSession::new();
    session.returning(vec![order_row(7, "bob", 12.5)]);
    let orders = CrudRepository::with_hooks(database(&session), Guard::default());

    let payload = json!({"totalAmount": 12.5, "userName": "bob"});
    let saved = orders.update(None, &7_i64, &payload, &Fields::new(), false, None).unwrap();

    assert!(saved.outcome.is_success());
    assert_eq!(saved.outcome.effect_count(), 0);
    assert!(saved.record.is_some());
    assert_eq!(orders.hooks().updates_checked.load(Ordering::SeqCst), 0);
    assert_eq!(session.statements().len(), 1);
}

#[test]
fn update_of_missing_key() {
    let session = RecordingSession::new();
    let orders = CrudRepository::<Order>::new(database(&session));

    let payload = json!({"totalAmount": 1.0});
    let saved = orders.update(None, &99_i64, &payload, &Fields::new(), false, None).unwrap();

    assert!(saved.outcome.is_success());
    assert_eq!(saved.outcome.effect_count(), 0);
    assert!(saved.record.is_none());
    assert_eq!(session.statements().len(), 1);
}

#[test]
fn vetoed_update_issues_no_update() {
    let session = RecordingSession::new();
    session.returning(vec![order_row(7, "bob", 12.5)]);
    let orders = CrudRepository::with_hooks(database(&session), Guard::default());

    let payload = json!({"totalAmount": -5.0});
    let saved = orders.update(None, &7_i64, &payload, &Fields::new(), false, None).unwrap();

    assert_eq!(saved.outcome.code(), -2);
    assert_eq!(session.statements().len(), 1);
}

#[test]
fn update_respects_field_filter() {
    let session = RecordingSession::new();
    session.returning(vec![order_row(7, "bob", 12.5)]);
    let orders = CrudRepository::<Order>::new(database(&session));

    let payload = json!({"totalAmount": 20.0, "userName": "ann"});
    let filter = Fields::of(["userName"]);
    let saved = orders.update(None, &7_i64, &payload, &filter, false, None).unwrap();

    assert_eq!(saved.outcome.effect_count(), 1);
    let statements = session.statements();
    assert_eq!(canonical(&statements[1].sql), "UPDATE orders SET user_name = ? WHERE order_id = ?");
}

#[test]
fn composite_key_update_binds_both_columns() {
    let session = RecordingSession::new();
    session.returning(vec![row(&[
        ("order_id", DataType::Int64(Some(7))),
        ("line_no", DataType::Int32(Some(2))),
        ("sku", DataType::Str(Some("A-1".to_string()))),
        ("quantity", DataType::Int32(Some(1))),
        ("created_by", DataType::Str(Some("ann".to_string()))),
    ])]);
    let lines = CrudRepository::<OrderLine>::new(database(&session));

    let key = OrderLineKey {
        order_id: 7,
        line_no: 2,
    };
    let payload = json!({"quantity": 5, "createdBy": "bob", "lineNo": 9});
    let saved = lines.update(None, &key, &payload, &Fields::new(), false, None).unwrap();

    assert_eq!(saved.outcome.effect_count(), 1);
    let line = saved.record.unwrap();
    assert_eq!(line.key, key);
    assert_eq!(line.quantity, 5);

    let statements = session.statements();
    assert_eq!(statements.len(), 2);
    assert_sql_contains(
        &statements[0].sql,
        &["FROM order_lines", "WHERE order_id = ? AND line_no = ?"],
    );
    assert_eq!(statements[0].params, vec![DataType::Int64(Some(7)), DataType::Int32(Some(2))]);
    assert_eq!(
        canonical(&statements[1].sql),
        "UPDATE order_lines SET quantity = ? WHERE order_id = ? AND line_no = ?"
    );
    assert_eq!(
        statements[1].params,
        vec![DataType::Int32(Some(5)), DataType::Int64(Some(7)), DataType::Int32(Some(2))]
    );
}

#[test]
fn bulk_update_runs_one_batch() {
    let session = RecordingSession::new();
    session.affecting(1);
    session.affecting(0);
    session.affecting(1);
    let orders = CrudRepository::<Order>::new(database(&session));

    let status = Fields::of(["status"]);
    let values = Params::new().add("SHIPPED");
    let affected = orders.update_fields(None, &[1_i64, 2, 3], &status, &values, None).unwrap();

    assert_eq!(affected, 2);
    assert_eq!(session.batches(), vec![3]);

    let statements = session.statements();
    assert_eq!(statements.len(), 3);
    for (statement, key) in statements.iter().zip([1_i64, 2, 3]) {
        assert_eq!(canonical(&statement.sql), "UPDATE orders SET status = ? WHERE order_id = ?");
        assert_eq!(
            statement.params,
            vec![DataType::Str(Some("SHIPPED".to_string())), DataType::Int64(Some(key))]
        );
    }
}

#[test]
fn bulk_update_rejects_unknown_fields() {
    let session = RecordingSession::new();
    let orders = CrudRepository::<Order>::new(database(&session));

    let unknown = Fields::of(["shipped_on"]);
    let err = orders
        .update_fields(None, &[1_i64], &unknown, &Params::new().add("2024-01-01"), None)
        .unwrap_err();
    assert!(err.is_argument());

    let misaligned = Fields::of(["status", "discount"]);
    let err = orders
        .update_fields(None, &[1_i64], &misaligned, &Params::new().add("X"), None)
        .unwrap_err();
    assert!(err.is_argument());
    assert!(session.statements().is_empty());
}

// queries

#[test]
fn find_all_counts_then_pages() {
    let session = RecordingSession::new();
    session.returning(count_row(2));
    session.returning(vec![order_row(1, "bob", 10.0), order_row(2, "bob", 30.0)]);
    let orders = CrudRepository::<Order>::new(database(&session));

    let criteria = Criteria::new()
        .cond(Cond::new().eq("status", "PAID"))
        .extra(Cond::new().eq("user_name", "bob"))
        .order(OrderBy::new().desc("totalAmount"))
        .excluded(["discount"])
        .page(Page::new(1));
    let set = orders.find_all(None, criteria).unwrap();

    assert_eq!(set.record_count, Some(2));
    assert_eq!(set.page_count(), Some(1));
    assert_eq!(set.records.len(), 2);
    assert_eq!(set.records[1].total_amount, 30.0);

    let statements = session.statements();
    assert_eq!(statements.len(), 2);
    assert_sql_contains(
        &statements[0].sql,
        &["SELECT COUNT(*)", "FROM orders", "WHERE status = ? AND user_name = ?"],
    );
    assert_sql_contains(
        &statements[1].sql,
        &[
            "FROM orders",
            "WHERE status = ? AND user_name = ?",
            "ORDER BY total_amount DESC",
            "LIMIT ?",
        ],
    );
    assert!(!statements[1].sql.contains("discount"));
    assert_eq!(statements[1].params.len(), 3);
}

#[test]
fn find_all_with_zero_total_skips_rows_query() {
    let session = RecordingSession::new();
    session.returning(count_row(0));
    let orders = CrudRepository::<Order>::new(database(&session));

    let set = orders.find_all(None, Criteria::new().page(Page::new(4))).unwrap();

    assert!(set.is_empty());
    assert_eq!(set.record_count, Some(0));
    assert_eq!(set.page_number, 4);
    assert_eq!(session.statements().len(), 1);
}

#[test]
fn find_first_loads_one_row() {
    let session = RecordingSession::new();
    session.returning(vec![order_row(3, "ann", 5.0)]);
    let orders = CrudRepository::<Order>::new(database(&session));

    let criteria = Criteria::new().cond(Cond::new().eq("user_name", "ann"));
    let order = orders.find_first(None, criteria).unwrap();

    assert_eq!(order.map(|order| order.order_id), Some(3));
    let statements = session.statements();
    assert_eq!(statements.len(), 1);
    assert_sql_contains(&statements[0].sql, &["WHERE user_name = ?", "LIMIT ?"]);
    assert_eq!(statements[0].params[1], DataType::Uint64(Some(1)));
}

#[test]
fn find_by_key_excludes_fields() {
    let session = RecordingSession::new();
    session.returning(vec![order_row(3, "ann", 5.0)]);
    let orders = CrudRepository::<Order>::new(database(&session));

    let order = orders.find(None, &3_i64, &["totalAmount"], None).unwrap().unwrap();

    assert_eq!(order.user_name, "ann");
    let sql = &session.sql()[0];
    assert!(!sql.contains("total_amount"), "{sql}");
    assert_sql_contains(sql, &["FROM orders", "WHERE order_id = ?"]);
}

#[test]
fn count_on_a_shard() {
    let session = RecordingSession::new();
    session.returning(count_row(5));
    let events = CrudRepository::<Event>::new(database(&session));

    let shard = ShardContext::new(2024);
    let total = events.count(None, Cond::new().eq("kind", "login"), Some(&shard)).unwrap();

    assert_eq!(total, 5);
    assert_sql_contains(
        &session.sql()[0],
        &["SELECT COUNT(*)", "FROM events_2024", "WHERE kind = ?"],
    );
}

// removal

#[test]
fn remove_by_key() {
    let session = RecordingSession::new();
    let orders = CrudRepository::<Order>::new(database(&session));

    let outcome = orders.remove(None, &7_i64, None).unwrap();

    assert_eq!(outcome.effect_count(), 1);
    assert_eq!(canonical(&session.sql()[0]), "DELETE FROM orders WHERE order_id = ?");
}

#[test]
fn remove_all_reports_per_key_counts() {
    let session = RecordingSession::new();
    session.affecting(1);
    session.affecting(0);
    let orders = CrudRepository::<Order>::new(database(&session));

    let outcome = orders.remove_all(None, &[1_i64, 2], None).unwrap();

    assert_eq!(outcome.get("effectCounts"), Some(&json!([1, 0])));
    assert_eq!(outcome.effect_count(), 1);
    assert_eq!(session.batches(), vec![2]);

    assert!(orders.remove_all(None, &Vec::<i64>::new(), None).unwrap_err().is_argument());
}

#[test]
fn composite_key_remove_all_binds_key_pairs() {
    let session = RecordingSession::new();
    let lines = CrudRepository::<OrderLine>::new(database(&session));

    let keys = [
        OrderLineKey {
            order_id: 7,
            line_no: 1,
        },
        OrderLineKey {
            order_id: 8,
            line_no: 3,
        },
    ];
    let outcome = lines.remove_all(None, &keys, None).unwrap();

    assert_eq!(outcome.get("effectCounts"), Some(&json!([1, 1])));
    assert_eq!(session.batches(), vec![2]);
    let statements = session.statements();
    for (statement, (order_id, line_no)) in statements.iter().zip([(7_i64, 1_i32), (8, 3)]) {
        assert_eq!(
            canonical(&statement.sql),
            "DELETE FROM order_lines WHERE order_id = ? AND line_no = ?"
        );
        assert_eq!(
            statement.params,
            vec![DataType::Int64(Some(order_id)), DataType::Int32(Some(line_no))]
        );
    }
}

#[test]
fn sharded_entity_writes_and_reads_its_partition() {
    let session = RecordingSession::new();
    let event = vec![row(&[
        ("event_id", DataType::Int64(Some(5))),
        ("kind", DataType::Str(Some("login".to_string()))),
    ])];
    session.returning(event.clone());
    session.returning(event);
    let events = CrudRepository::<Event>::new(database(&session));
    let shard = ShardContext::new(2024);

    let found = events.find(None, &5_i64, &[], Some(&shard)).unwrap().unwrap();
    assert_eq!(found.kind, "login");
    let payload = json!({"kind": "logout"});
    let saved = events.update(None, &5_i64, &payload, &Fields::new(), false, Some(&shard)).unwrap();
    assert_eq!(saved.outcome.effect_count(), 1);
    events.remove(None, &5_i64, Some(&shard)).unwrap();

    let sql = session.sql();
    assert_eq!(sql.len(), 4);
    assert_sql_contains(&sql[0], &["FROM events_2024", "WHERE event_id = ?"]);
    assert_sql_contains(&sql[1], &["FROM events_2024", "WHERE event_id = ?"]);
    assert_eq!(canonical(&sql[2]), "UPDATE events_2024 SET kind = ? WHERE event_id = ?");
    assert_eq!(canonical(&sql[3]), "DELETE FROM events_2024 WHERE event_id = ?");

    events.remove(None, &5_i64, None).unwrap();
    assert_eq!(canonical(&session.sql()[4]), "DELETE FROM events WHERE event_id = ?");
}

#[test]
fn unknown_data_source() {
    let session = RecordingSession::new();
    let orders = CrudRepository::<Order>::new(database(&session));
    assert!(orders.find(Some("archive"), &1_i64, &[], None).unwrap_err().is_argument());
}

// state wrapper

#[test]
fn unchanged_wrapper_is_a_noop() {
    let session = RecordingSession::new();
    let database = database(&session);
    let executor = Executor::new(database.source(None).unwrap());

    let wrapper = StateWrapper::bind(Order::default(), false).unwrap();
    assert!(wrapper.changed_properties().is_empty());

    let outcome = wrapper.update(&executor, &Fields::new(), None).unwrap();
    assert_eq!(outcome, UpdateOutcome::NoOp);
    assert!(session.statements().is_empty());
}

#[test]
fn changed_set_follows_declaration_order() {
    let mut wrapper = StateWrapper::bind(Order::default(), false).unwrap();
    wrapper.record_mut().discount = Some(2.5);
    wrapper.record_mut().user_name = "bob".to_string();

    assert_eq!(wrapper.changed_properties(), vec!["userName", "discount"]);
    assert_eq!(wrapper.changed_fields().tokens(), ["userName", "discount"]);
}

#[test]
fn ignore_null_skips_null_transitions() {
    let mut wrapper = StateWrapper::bind(Order::default(), true).unwrap();
    wrapper.record_mut().discount = Some(2.5);
    wrapper.record_mut().total_amount = 3.0;

    assert_eq!(wrapper.changed_properties(), vec!["totalAmount"]);
}

#[test]
fn update_if_lets_caller_decline() {
    let session = RecordingSession::new();
    let database = database(&session);
    let executor = Executor::new(database.source(None).unwrap());

    let mut wrapper = StateWrapper::bind(Order::default(), false).unwrap();
    wrapper.record_mut().status = Some("PAID".to_string());

    let outcome = wrapper
        .update_if(
            &executor,
            |changed| {
                if changed.contains(&"status".to_string()) {
                    Fields::new()
                } else {
                    Fields::of(changed.iter().cloned())
                }
            },
            None,
        )
        .unwrap();
    assert!(outcome.is_noop());
    assert!(session.statements().is_empty());
}

#[test]
fn update_if_writes_the_selected_subset() {
    let session = RecordingSession::new();
    let database = database(&session);
    let executor = Executor::new(database.source(None).unwrap());

    let mut wrapper = StateWrapper::bind(order_with_key(7), false).unwrap();
    wrapper.record_mut().status = Some("PAID".to_string());
    wrapper.record_mut().discount = Some(1.5);
    wrapper.record_mut().user_name = "ann".to_string();

    let outcome = wrapper
        .update_if(
            &executor,
            |changed| {
                assert_eq!(changed, ["userName", "status", "discount"]);
                Fields::excluding(["status"])
            },
            None,
        )
        .unwrap();

    assert_eq!(outcome.effect_count(), 1);
    let statements = session.statements();
    assert_eq!(
        canonical(&statements[0].sql),
        "UPDATE orders SET user_name = ?, discount = ? WHERE order_id = ?"
    );
    assert_eq!(
        statements[0].params,
        vec![
            DataType::Str(Some("ann".to_string())),
            DataType::Double(Some(1.5)),
            DataType::Int64(Some(7))
        ]
    );
}

fn order_with_key(order_id: i64) -> Order {
    Order {
        order_id,
        ..Order::default()
    }
}

fn canonical(sql: &str) -> String {
    sql.replace(['"', '(', ')'], "").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn sessions_can_be_shared() {
    let session = RecordingSession::new();
    let database = database(&session);
    let first = CrudRepository::<Order>::new(Arc::clone(&database));
    let second = CrudRepository::<Event>::new(database);

    first.remove(None, &1_i64, None).unwrap();
    second.remove(None, &2_i64, None).unwrap();
    assert_eq!(session.statements().len(), 2);
}
