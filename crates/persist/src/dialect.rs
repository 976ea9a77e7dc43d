//! SQL dialects.
//!
//! Statements are assembled once in a neutral form with `?` markers. A
//! [`Dialect`] supplies what differs between databases: identifier quoting,
//! placeholder style, paging, row locks, sequences and physical table names.

use std::fmt::Debug;

use sea_query::{LockType, SelectStatement};

use crate::descriptor::EntityDescriptor;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::query::number_placeholders;
use crate::sharding::ShardContext;

/// Database-specific rendering.
pub trait Dialect: Send + Sync + Debug {
    /// Dialect name, for logging.
    fn name(&self) -> &'static str;

    /// Identifier quote character.
    fn identifier_quote(&self) -> u8 {
        b'"'
    }

    /// `name` wrapped in the identifier quote, embedded quotes doubled.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = char::from(self.identifier_quote());
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Rewrites neutral `?` markers into the dialect's placeholder style.
    fn render_placeholders(&self, sql: String) -> String {
        sql
    }

    /// Restricts `select` to one page.
    fn page(&self, select: &mut SelectStatement, page: &Page) {
        select.limit(page.page_size());
        if page.offset() > 0 {
            select.offset(page.offset());
        }
    }

    /// Adds a row-lock hint to `select`.
    fn lock(&self, select: &mut SelectStatement) {
        select.lock(LockType::Update);
    }

    /// Expression yielding the next value of `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] when the dialect has no sequences.
    fn sequence_next_value(&self, sequence: &str) -> Result<String> {
        Err(Error::Unsupported(format!("{} has no sequence '{sequence}'", self.name())))
    }

    /// Whether INSERT reports the generated key through `RETURNING`.
    fn returns_generated_keys(&self) -> bool {
        false
    }

    /// Physical table name: prefix plus the sharded or plain entity name.
    fn table_name(
        &self, prefix: &str, descriptor: &EntityDescriptor, shard: Option<&ShardContext>,
    ) -> String {
        let name = match (descriptor.sharding_rule(), shard) {
            (Some(rule), Some(context)) => rule.shard_name(descriptor.entity_name(), context),
            _ => descriptor.entity_name().to_string(),
        };
        format!("{prefix}{name}")
    }
}

/// SQLite: `?` markers, no row locks, no sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn lock(&self, _select: &mut SelectStatement) {}
}

/// PostgreSQL: `$n` markers, `nextval` sequences, keys read back with `RETURNING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn render_placeholders(&self, sql: String) -> String {
        number_placeholders(&sql, "$")
    }

    fn sequence_next_value(&self, sequence: &str) -> Result<String> {
        Ok(format!("nextval('{sequence}')"))
    }

    fn returns_generated_keys(&self) -> bool {
        true
    }
}

/// MySQL: backtick identifiers, `?` markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> u8 {
        b'`'
    }
}
