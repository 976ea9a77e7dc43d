//! End-to-end tests against an in-memory `SQLite` database.

#![allow(missing_docs, clippy::float_cmp)]

mod common;

use std::sync::Arc;

use common::Order;
use omnia_persist::{
    Cond, Criteria, CrudRepository, DataSource, DataType, Database, Executor, FetchValue, Fields,
    OrderBy, Page, Params, Sqlite, SqliteSession,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const SCHEMA: &str = "
    CREATE TABLE orders (
        order_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_name TEXT NOT NULL,
        total_amount REAL NOT NULL,
        status TEXT,
        discount REAL
    );
";

fn repository() -> CrudRepository<Order> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let session = SqliteSession::open_in_memory().unwrap();
    session.execute_script(SCHEMA).unwrap();
    let source = DataSource::new("default", Arc::new(session), Arc::new(Sqlite));
    let database = Database::default().with_source(source);
    CrudRepository::new(Arc::new(database))
}

#[test]
fn order_lifecycle() {
    let orders = repository();

    let bob = orders
        .create(None, &json!({"userName": "bob", "totalAmount": 12.5}), &Fields::new(), None)
        .unwrap();
    assert_eq!(bob.outcome.get("id"), Some(&json!(1)));
    let ann = orders
        .create(None, &json!({"user_name": "ann", "totalAmount": 30}), &Fields::new(), None)
        .unwrap();
    assert_eq!(ann.outcome.get("id"), Some(&json!(2)));

    let stored = orders.find(None, &1_i64, &[], None).unwrap().unwrap();
    assert_eq!(stored.user_name, "bob");
    assert_eq!(stored.status.as_deref(), Some("NEW"));
    assert_eq!(stored.discount, None);

    let updated = orders
        .update(None, &1_i64, &json!({"totalAmount": 20.0}), &Fields::new(), false, None)
        .unwrap();
    assert_eq!(updated.outcome.effect_count(), 1);
    assert_eq!(orders.find(None, &1_i64, &[], None).unwrap().unwrap().total_amount, 20.0);

    let status = Fields::of(["status"]);
    let values = Params::new().add("SHIPPED");
    let shipped = orders.update_fields(None, &[1_i64, 2], &status, &values, None).unwrap();
    assert_eq!(shipped, 2);

    let set = orders
        .find_all(
            None,
            Criteria::new()
                .cond(Cond::new().eq("status", "SHIPPED"))
                .order(OrderBy::new().desc("totalAmount"))
                .page(Page::new(1)),
        )
        .unwrap();
    assert_eq!(set.record_count, Some(2));
    assert_eq!(set.records[0].user_name, "ann");
    assert_eq!(set.records[0].total_amount, 30.0);
    assert_eq!(set.records[1].user_name, "bob");

    let removed = orders.remove_all(None, &[1_i64, 2, 3], None).unwrap();
    assert_eq!(removed.get("effectCounts"), Some(&json!([1, 1, 0])));
    assert_eq!(removed.effect_count(), 2);
    assert_eq!(orders.count(None, Cond::new(), None).unwrap(), 0);
}

#[test]
fn paging_and_raw_queries() {
    let orders = repository();
    for n in 1..=5 {
        let payload = json!({"userName": format!("user{n}"), "totalAmount": n * 10});
        orders.create(None, &payload, &Fields::new(), None).unwrap();
    }

    let criteria = Criteria::new().order(OrderBy::new().asc("orderId")).page(Page::new(2).size(2));
    let page = orders.find_all(None, criteria).unwrap();
    assert_eq!(page.record_count, Some(5));
    assert_eq!(page.page_count(), Some(3));
    assert_eq!(page.records.iter().map(|order| order.order_id).collect::<Vec<_>>(), vec![3, 4]);

    let criteria = Criteria::new()
        .cond(Cond::new().gt("total_amount", 35))
        .order(OrderBy::new().asc("order_id"));
    let first = orders.find_first(None, criteria).unwrap().unwrap();
    assert_eq!(first.user_name, "user4");

    let executor = Executor::new(orders.database().source(None).unwrap());
    let affected = executor
        .execute(
            "UPDATE orders SET discount = ? WHERE total_amount >= ?",
            Params::new().add(1.5).add(40),
        )
        .unwrap();
    assert_eq!(affected, 2);

    let rows = executor
        .query("SELECT COUNT(*) AS total FROM orders WHERE discount IS NOT NULL", Params::new())
        .unwrap();
    assert_eq!(rows[0].get("total"), Some(&DataType::Int64(Some(2))));
    assert_eq!(i64::fetch(&rows[0], "total").unwrap(), 2);

    let err = executor.query("SELECT * FROM orders WHERE order_id = ?", Params::new()).unwrap_err();
    assert!(err.is_argument());
}
