//! Default `SQLite` session.
//!
//! This is a lightweight implementation for development and tests.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::sync::Arc;

use anyhow::{Context, Result};
use fromenv::FromEnv;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params_from_iter};

use crate::session::{Inserted, Session};
use crate::types::{DataType, Field, Row};

/// Options used to open the `SQLite` database.
///
/// This struct is used to load connection options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct SqliteOptions {
    /// Database path, or a `SQLite` URI.
    #[env(from = "SQL_DATABASE", default = "file::memory:?cache=shared")]
    pub database: String,
}

impl SqliteOptions {
    /// Loads options from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

/// [`Session`] over a single `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteSession {
    // Mutex is necessary since rusqlite::Connection isn't `Sync`
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSession {
    /// Opens the database named by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn connect_with(options: &SqliteOptions) -> Result<Self> {
        tracing::debug!("initializing SQLite connection to: {}", options.database);
        let conn = Connection::open(&options.database).context("failed to open SQLite database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open SQLite database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs a script of `;`-separated statements without parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql).context("failed to execute script")
    }
}

impl Session for SqliteSession {
    fn execute(&self, sql: &str, params: &[DataType]) -> Result<u64> {
        tracing::debug!("executing statement: {}", sql);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).context("failed to prepare statement")?;
        let values: Vec<_> = params.iter().map(datatype_to_rusqlite_value).collect();
        let affected =
            stmt.execute(params_from_iter(values.iter())).context("failed to execute statement")?;
        Ok(affected as u64)
    }

    fn insert(&self, sql: &str, params: &[DataType]) -> Result<Inserted> {
        tracing::debug!("executing insert: {}", sql);
        let conn = self.conn.lock();
        let affected = {
            let mut stmt = conn.prepare(sql).context("failed to prepare statement")?;
            let values: Vec<_> = params.iter().map(datatype_to_rusqlite_value).collect();
            stmt.execute(params_from_iter(values.iter())).context("failed to execute insert")?
        };
        let generated_key = (affected > 0).then(|| DataType::Int64(Some(conn.last_insert_rowid())));
        Ok(Inserted {
            affected: affected as u64,
            generated_key,
        })
    }

    fn execute_batch(&self, sql: &str, batch: &[Vec<DataType>]) -> Result<Vec<u64>> {
        tracing::debug!(size = batch.len(), "executing batch: {}", sql);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).context("failed to prepare statement")?;
        batch
            .iter()
            .map(|params| -> Result<u64> {
                let values: Vec<_> = params.iter().map(datatype_to_rusqlite_value).collect();
                let affected = stmt
                    .execute(params_from_iter(values.iter()))
                    .context("failed to execute batch statement")?;
                Ok(affected as u64)
            })
            .collect()
    }

    fn query(&self, sql: &str, params: &[DataType]) -> Result<Vec<Row>> {
        tracing::debug!("executing query: {}", sql);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).context("failed to prepare statement")?;
        let values: Vec<_> = params.iter().map(datatype_to_rusqlite_value).collect();
        let column_names: Vec<String> =
            stmt.column_names().iter().map(ToString::to_string).collect();

        let mut rows =
            stmt.query(params_from_iter(values.iter())).context("failed to execute query")?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().context("failed to fetch row")? {
            let mut fields = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                let value = row.get_ref(i).context("failed to get column value")?;
                fields.push(Field {
                    name: name.clone(),
                    value: rusqlite_value_to_datatype(value)?,
                });
            }
            result.push(Row {
                index: result.len().to_string(),
                fields,
            });
        }
        Ok(result)
    }
}

fn datatype_to_rusqlite_value(dt: &DataType) -> rusqlite::types::Value {
    use rusqlite::types::Value;

    match dt {
        DataType::Boolean(Some(b)) => Value::Integer(i64::from(*b)),
        DataType::Int32(Some(i)) => Value::Integer(i64::from(*i)),
        DataType::Int64(Some(i)) => Value::Integer(*i),
        DataType::Uint32(Some(u)) => Value::Integer(i64::from(*u)),
        DataType::Uint64(Some(u)) => Value::Integer(*u as i64),
        DataType::Float(Some(f)) => Value::Real(f64::from(*f)),
        DataType::Double(Some(f)) => Value::Real(*f),
        DataType::Binary(Some(b)) => Value::Blob(b.clone()),
        DataType::Str(Some(s))
        | DataType::Date(Some(s))
        | DataType::Time(Some(s))
        | DataType::Timestamp(Some(s)) => Value::Text(s.clone()),
        // All None variants map to NULL
        _ => Value::Null,
    }
}

fn rusqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Str(None)),
        ValueRef::Integer(i) => Ok(DataType::Int64(Some(i))),
        ValueRef::Real(f) => Ok(DataType::Double(Some(f))),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(Some(s.to_string())))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(Some(b.to_vec()))),
    }
}
