//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use omnia_persist::{
    DataSource, DataType, Database, DatabaseOptions, Dialect, Field, Inserted, Row, Session, Sqlite,
    SuffixSharding, entity, record,
};
use parking_lot::Mutex;

// Common test entities used across multiple test files

entity! {
    table = "orders",
    declare = |d| d
        .primary_key("order_id")
        .property("order_id", |p| p.autoincrement())
        .property("status", |p| p.default_value("NEW"))
        .index("ix_user_status", &["user_name", "status"]),
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Order {
        pub order_id: i64,
        pub user_name: String,
        pub total_amount: f64,
        pub status: Option<String>,
        pub discount: Option<f64>,
    }
}

record! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct OrderLineKey {
        pub order_id: i64,
        pub line_no: i32,
    }
}

entity! {
    table = "order_lines",
    declare = |d| d
        .primary_key("key")
        .property("created_by", |p| p.readonly()),
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct OrderLine {
        pub key: OrderLineKey,
        pub sku: String,
        pub quantity: i32,
        pub created_by: String,
    }
}

entity! {
    table = "events",
    declare = |d| d
        .primary_key("event_id")
        .property("event_id", |p| p.sequence("events_seq"))
        .sharding(Arc::new(SuffixSharding)),
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Event {
        pub event_id: i64,
        pub kind: String,
    }
}

/// Statement sent to a [`RecordingSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DataType>,
}

/// Session that records every statement and replays scripted results.
///
/// Queries pop the next scripted row set (empty when none is left); writes
/// report one affected row per statement unless scripted otherwise. Inserts
/// generate keys 1, 2, 3 ..
#[derive(Debug, Default)]
pub struct RecordingSession {
    statements: Mutex<Vec<Statement>>,
    batches: Mutex<Vec<usize>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    affected: Mutex<VecDeque<u64>>,
    last_key: Mutex<i64>,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the rows returned by the next query.
    pub fn returning(&self, rows: Vec<Row>) {
        self.rows.lock().push_back(rows);
    }

    /// Queues the affected count reported by the next write.
    pub fn affecting(&self, count: u64) {
        self.affected.lock().push_back(count);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements.lock().iter().map(|statement| statement.sql.clone()).collect()
    }

    /// Sizes of the batches executed so far.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    fn record(&self, sql: &str, params: &[DataType]) {
        self.statements.lock().push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

impl Session for RecordingSession {
    fn execute(&self, sql: &str, params: &[DataType]) -> anyhow::Result<u64> {
        self.record(sql, params);
        Ok(self.affected.lock().pop_front().unwrap_or(1))
    }

    fn query(&self, sql: &str, params: &[DataType]) -> anyhow::Result<Vec<Row>> {
        self.record(sql, params);
        Ok(self.rows.lock().pop_front().unwrap_or_default())
    }

    fn insert(&self, sql: &str, params: &[DataType]) -> anyhow::Result<Inserted> {
        let affected = self.execute(sql, params)?;
        let mut last_key = self.last_key.lock();
        *last_key += 1;
        Ok(Inserted {
            affected,
            generated_key: Some(DataType::Int64(Some(*last_key))),
        })
    }

    fn execute_batch(&self, sql: &str, batch: &[Vec<DataType>]) -> anyhow::Result<Vec<u64>> {
        self.batches.lock().push(batch.len());
        batch.iter().map(|params| self.execute(sql, params)).collect()
    }
}

/// Database with a single `default` source over `session`.
pub fn database(session: &Arc<RecordingSession>) -> Arc<Database> {
    database_with(session, Arc::new(Sqlite))
}

/// Database with a single `default` source over `session`, rendering with `dialect`.
pub fn database_with(session: &Arc<RecordingSession>, dialect: Arc<dyn Dialect>) -> Arc<Database> {
    let session: Arc<dyn Session> = Arc::<RecordingSession>::clone(session);
    let source = DataSource::new("default", session, dialect);
    Arc::new(Database::new(DatabaseOptions::default()).with_source(source))
}

/// Row keyed by field names.
pub fn row(fields: &[(&str, DataType)]) -> Row {
    Row {
        index: "0".to_string(),
        fields: fields
            .iter()
            .map(|(name, value)| Field {
                name: (*name).to_string(),
                value: value.clone(),
            })
            .collect(),
    }
}

/// Stored `orders` row.
pub fn order_row(order_id: i64, user_name: &str, total_amount: f64) -> Row {
    row(&[
        ("order_id", DataType::Int64(Some(order_id))),
        ("user_name", DataType::Str(Some(user_name.to_string()))),
        ("total_amount", DataType::Double(Some(total_amount))),
        ("status", DataType::Str(Some("NEW".to_string()))),
        ("discount", DataType::Str(None)),
    ])
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and grouping
/// parentheses, and normalizing whitespace. Preserves string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' | '`' | '(' | ')' if !in_single_quote => {
                // Strip identifier quoting and grouping to avoid brittle comparisons.
            }
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// This helper normalizes SQL to avoid brittle exact-string matching with ``SeaQuery`` output.
/// It strips identifier quotes and parentheses, normalizes whitespace, and checks that
/// fragments appear sequentially in the generated SQL.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!(
                "expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`"
            );
        }
    }
}

/// Assert that SQL contains none of `fragments`.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_lacks(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        assert!(
            !actual_canonical.contains(&fragment_canonical),
            "unexpected SQL fragment `{fragment_canonical}` in `{actual_canonical}`"
        );
    }
}
