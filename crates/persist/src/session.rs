//! Session collaborator and named data sources.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use anyhow::Context;
use fromenv::FromEnv;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::types::{DataType, Row};

/// Result of an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inserted {
    /// Rows inserted.
    pub affected: u64,
    /// Key generated by the database, if any.
    pub generated_key: Option<DataType>,
}

/// SQL providers implement the [`Session`] trait to execute rendered
/// statements against a physical database.
///
/// Parameters arrive in placeholder order. Errors are passed through to the
/// caller unchanged.
pub trait Session: Debug + Send + Sync + 'static {
    /// Execute a statement that returns no rows and report the affected row count.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn execute(&self, sql: &str, params: &[DataType]) -> anyhow::Result<u64>;

    /// Execute a query and return the resulting rows.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn query(&self, sql: &str, params: &[DataType]) -> anyhow::Result<Vec<Row>>;

    /// Execute an insert and report the generated key.
    ///
    /// The key is the driver's last insert id; sequence-drawn keys count. For
    /// dialects that return keys, the insert carries `RETURNING` and is sent
    /// through [`Session::query`] instead.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn insert(&self, sql: &str, params: &[DataType]) -> anyhow::Result<Inserted> {
        let affected = self.execute(sql, params)?;
        Ok(Inserted {
            affected,
            generated_key: None,
        })
    }

    /// Execute one statement once per parameter set, returning each affected count.
    ///
    /// # Errors
    ///
    /// Returns the driver's error; earlier sets may already have been applied.
    fn execute_batch(&self, sql: &str, batch: &[Vec<DataType>]) -> anyhow::Result<Vec<u64>> {
        batch.iter().map(|params| self.execute(sql, params)).collect()
    }
}

/// A named database: a session, the dialect it speaks and a table prefix.
#[derive(Debug, Clone)]
pub struct DataSource {
    name: String,
    session: Arc<dyn Session>,
    dialect: Arc<dyn Dialect>,
    table_prefix: String,
}

impl DataSource {
    /// Data source `name` over `session`, rendering with `dialect`.
    pub fn new(
        name: impl Into<String>, session: Arc<dyn Session>, dialect: Arc<dyn Dialect>,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            dialect,
            table_prefix: String::new(),
        }
    }

    /// Prefix prepended to every physical table name.
    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Data source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session executing statements.
    #[must_use]
    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    /// Dialect rendering statements.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Table prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.table_prefix
    }
}

/// Options used to resolve data sources.
///
/// This struct is used to load options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct DatabaseOptions {
    /// Data source used when a caller names none.
    #[env(from = "PERSIST_DEFAULT_DATA_SOURCE", default = "default")]
    pub default_source: String,

    /// Prefix applied to data sources registered without one.
    #[env(from = "PERSIST_TABLE_PREFIX", default = "")]
    pub table_prefix: String,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            default_source: "default".to_string(),
            table_prefix: String::new(),
        }
    }
}

impl DatabaseOptions {
    /// Loads options from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::from_env()
            .finalize()
            .context("issue loading database options")
            .map_err(|e| Error::Config(format!("{e:#}")))
    }
}

/// Named data sources.
#[derive(Debug, Clone, Default)]
pub struct Database {
    options: DatabaseOptions,
    sources: HashMap<String, DataSource>,
}

impl Database {
    /// Empty registry using `options`.
    #[must_use]
    pub fn new(options: DatabaseOptions) -> Self {
        Self {
            options,
            sources: HashMap::new(),
        }
    }

    /// Registers `source`, replacing any source with the same name. Sources
    /// without a prefix take the configured one.
    #[must_use]
    pub fn with_source(mut self, source: DataSource) -> Self {
        let source = if source.table_prefix.is_empty() && !self.options.table_prefix.is_empty() {
            let prefix = self.options.table_prefix.clone();
            source.table_prefix(prefix)
        } else {
            source
        };
        tracing::debug!(
            name = %source.name,
            dialect = source.dialect.name(),
            "registered data source"
        );
        self.sources.insert(source.name.clone(), source);
        self
    }

    /// Data source `name`, or the default source when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] for a blank or unknown name.
    pub fn source(&self, name: Option<&str>) -> Result<&DataSource> {
        let name = name.unwrap_or(&self.options.default_source);
        if name.trim().is_empty() {
            return Err(crate::argument_error!("blank data source name"));
        }
        self.sources
            .get(name)
            .ok_or_else(|| crate::argument_error!("unknown data source '{}'", name))
    }

    /// Registered source names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }
}
