//! Entity level statement execution against one data source.

use sea_query::Value;

use crate::cache::describe;
use crate::clause::Where;
use crate::cond::{Cond, Fragment};
use crate::convert::FetchValue;
use crate::delete::DeleteBuilder;
use crate::descriptor::EntityDescriptor;
use crate::entity::{Column, Entity};
use crate::error::{Error, Result};
use crate::fields::Fields;
use crate::insert::InsertBuilder;
use crate::page::{Page, ResultSet};
use crate::params::Params;
use crate::query::Query;
use crate::select::SelectBuilder;
use crate::session::{DataSource, Inserted};
use crate::sharding::ShardContext;
use crate::types::Row;
use crate::update::UpdateBuilder;

/// Renders entity statements for a data source and runs them on its session.
///
/// Session failures surface as [`Error::Session`] carrying the driver's error.
#[derive(Debug, Clone, Copy)]
pub struct Executor<'a> {
    source: &'a DataSource,
}

impl<'a> Executor<'a> {
    /// Executor over `source`.
    #[must_use]
    pub const fn new(source: &'a DataSource) -> Self {
        Self { source }
    }

    /// The data source statements run against.
    #[must_use]
    pub const fn source(&self) -> &'a DataSource {
        self.source
    }

    /// Physical table for `descriptor` under `shard`.
    #[must_use]
    pub fn table(&self, descriptor: &EntityDescriptor, shard: Option<&ShardContext>) -> String {
        self.source.dialect().table_name(self.source.prefix(), descriptor, shard)
    }

    /// Inserts the properties of `record` passing `fields` and fills its first
    /// autoincrement key, sequence-drawn or not, from the generated key. Dialects
    /// that return keys read it from the `RETURNING` row; others ask the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be built, the session fails, or
    /// the generated key does not fit the key field.
    pub fn insert<E: Entity>(
        &self, record: &mut E, fields: &Fields, shard: Option<&ShardContext>,
    ) -> Result<u64> {
        let descriptor = describe::<E>()?;
        let query = InsertBuilder::new(&descriptor, self.table(&descriptor, shard))
            .fields(fields.clone())
            .record(record)
            .build(self.source.dialect())?;
        let generated = descriptor.generated_key();
        let session = self.source.session();
        let inserted = if generated.is_some() && self.source.dialect().returns_generated_keys() {
            let rows = session.query(&query.sql, &query.params)?;
            Inserted {
                affected: rows.len() as u64,
                generated_key: rows
                    .first()
                    .and_then(|row| row.fields.first())
                    .map(|field| field.value.clone()),
            }
        } else {
            session.insert(&query.sql, &query.params)?
        };

        if let (Some(property), Some(key)) = (generated, &inserted.generated_key) {
            record
                .__set_value(property.field(), key)
                .map_err(|e| {
                    Error::Conversion(format!("generated key '{}': {e}", property.name()))
                })?;
        }
        Ok(inserted.affected)
    }

    /// Inserts `records`, batching consecutive records that render the same
    /// statement. Generated keys are not read back.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement cannot be built or the session fails.
    pub fn insert_batch<E: Entity>(
        &self, records: &[E], shard: Option<&ShardContext>,
    ) -> Result<u64> {
        let descriptor = describe::<E>()?;
        let table = self.table(&descriptor, shard);
        let queries = records
            .iter()
            .map(|record| {
                InsertBuilder::new(&descriptor, table.as_str())
                    .record(record)
                    .build(self.source.dialect())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.run_batches(queries)?.iter().sum())
    }

    // Groups consecutive queries sharing SQL into one session batch.
    fn run_batches(&self, queries: Vec<Query>) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(queries.len());
        let mut queries = queries.into_iter().peekable();
        while let Some(first) = queries.next() {
            let mut batch = vec![first.params];
            while let Some(next) = queries.next_if(|next| next.sql == first.sql) {
                batch.push(next.params);
            }
            tracing::debug!(sql = %first.sql, size = batch.len(), "executing batch");
            counts.extend(self.source.session().execute_batch(&first.sql, &batch)?);
        }
        Ok(counts)
    }

    /// Updates the row keyed by `record`'s key with the record's values for the
    /// assignable properties passing `fields`.
    ///
    /// Returns 0 without a statement when no property passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be built or the session fails.
    pub fn update<E: Entity>(
        &self, record: &E, fields: &Fields, shard: Option<&ShardContext>,
    ) -> Result<u64> {
        let descriptor = describe::<E>()?;
        let builder =
            UpdateBuilder::new(&descriptor, self.table(&descriptor, shard)).record(record, fields)?;
        if builder.is_empty() {
            return Ok(0);
        }
        let filter = descriptor.key_cond(self.source.dialect(), key_values(&descriptor, record))?;
        let query = builder.filter(filter).build(self.source.dialect())?;
        Ok(self.source.session().execute(&query.sql, &query.params)?)
    }

    /// Sets `fields` to `values` on every row in `keys`, as one batch of a
    /// single statement. Returns the affected count per key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if `keys` is empty, `fields` and `values`
    /// differ in length, or a field is not an updatable property.
    pub fn update_fields<E: Entity, K: Column>(
        &self, keys: &[K], fields: &Fields, values: &Params, shard: Option<&ShardContext>,
    ) -> Result<Vec<u64>> {
        let descriptor = describe::<E>()?;
        if keys.is_empty() {
            return Err(crate::argument_error!("no keys given for '{}'", descriptor.entity_name()));
        }
        if fields.is_empty() || fields.len() != values.len() {
            return Err(crate::argument_error!(
                "{} fields but {} values for '{}'",
                fields.len(),
                values.len(),
                descriptor.entity_name()
            ));
        }
        for field in fields {
            if !descriptor.contains_property(field) {
                return Err(crate::argument_error!(
                    "'{}' is not a property of '{}'",
                    field,
                    descriptor.entity_name()
                ));
            }
        }

        let table = self.table(&descriptor, shard);
        let queries = keys
            .iter()
            .map(|key| {
                let mut builder = UpdateBuilder::new(&descriptor, table.as_str());
                for (field, value) in fields.tokens().iter().zip(values.values()) {
                    builder = builder.set(field, value.clone())?;
                }
                let dialect = self.source.dialect();
                builder.filter(descriptor.key_cond(dialect, key.values())?).build(dialect)
            })
            .collect::<Result<Vec<_>>>()?;
        self.run_batches(queries)
    }

    /// Deletes the row keyed by `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not match the entity's key or the
    /// session fails.
    pub fn delete_by_key<E: Entity, K: Column>(
        &self, key: &K, shard: Option<&ShardContext>,
    ) -> Result<u64> {
        let descriptor = describe::<E>()?;
        let cond = descriptor.key_cond(self.source.dialect(), key.values())?;
        self.delete_where(&descriptor, cond, shard)
    }

    /// Deletes the row keyed by `record`'s key.
    ///
    /// # Errors
    ///
    /// Returns an error if the session fails.
    pub fn delete<E: Entity>(&self, record: &E, shard: Option<&ShardContext>) -> Result<u64> {
        let descriptor = describe::<E>()?;
        let cond = descriptor.key_cond(self.source.dialect(), key_values(&descriptor, record))?;
        self.delete_where(&descriptor, cond, shard)
    }

    /// Deletes every row matching `cond`. An empty predicate is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] for an empty predicate, or the session's error.
    pub fn delete_all<E: Entity>(&self, cond: Cond, shard: Option<&ShardContext>) -> Result<u64> {
        let descriptor = describe::<E>()?;
        self.delete_where(&descriptor, cond, shard)
    }

    fn delete_where(
        &self, descriptor: &EntityDescriptor, cond: Cond, shard: Option<&ShardContext>,
    ) -> Result<u64> {
        let query = DeleteBuilder::new(descriptor, self.table(descriptor, shard))
            .filter(cond)
            .build(self.source.dialect())?;
        Ok(self.source.session().execute(&query.sql, &query.params)?)
    }

    /// Deletes the rows keyed by `keys` as one batch, returning the affected
    /// count per key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] for an empty key list, or the session's error.
    pub fn delete_batch<E: Entity, K: Column>(
        &self, keys: &[K], shard: Option<&ShardContext>,
    ) -> Result<Vec<u64>> {
        let descriptor = describe::<E>()?;
        if keys.is_empty() {
            return Err(crate::argument_error!("no keys given for '{}'", descriptor.entity_name()));
        }
        let table = self.table(&descriptor, shard);
        let queries = keys
            .iter()
            .map(|key| {
                DeleteBuilder::new(&descriptor, table.as_str())
                    .filter(descriptor.key_cond(self.source.dialect(), key.values())?)
                    .build(self.source.dialect())
            })
            .collect::<Result<Vec<_>>>()?;
        self.run_batches(queries)
    }

    /// Loads the row keyed by `key`, optionally with the dialect's row lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not match the entity's key, the session
    /// fails, or a column cannot be converted.
    pub fn find_by_key<E: Entity, K: Column>(
        &self, key: &K, fields: &Fields, lock: bool, shard: Option<&ShardContext>,
    ) -> Result<Option<E>> {
        let descriptor = describe::<E>()?;
        let query = SelectBuilder::new(&descriptor, self.table(&descriptor, shard))
            .fields(fields.clone())
            .clause(descriptor.key_cond(self.source.dialect(), key.values())?)
            .lock(lock)
            .build(self.source.dialect())?;
        let rows = self.source.session().query(&query.sql, &query.params)?;
        rows.first().map(to_record).transpose()
    }

    /// Loads one page of rows matching `clause`.
    ///
    /// When the page asks for a total, a count runs first and a zero total
    /// returns an empty page without querying rows.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement cannot be built, the session fails, or a
    /// column cannot be converted.
    pub fn find<E: Entity>(
        &self, clause: Where, fields: &Fields, page: &Page, shard: Option<&ShardContext>,
    ) -> Result<ResultSet<E>> {
        let descriptor = describe::<E>()?;
        let table = self.table(&descriptor, shard);

        let record_count = if page.wants_count() {
            let query = SelectBuilder::new(&descriptor, table.as_str())
                .clause(clause.clone())
                .build_count(self.source.dialect())?;
            let total = self.count_rows(&query)?;
            if total == 0 {
                return Ok(ResultSet::empty(page, Some(0)));
            }
            Some(total)
        } else {
            None
        };

        let query = SelectBuilder::new(&descriptor, table)
            .fields(fields.clone())
            .clause(clause)
            .page(*page)
            .build(self.source.dialect())?;
        let rows = self.source.session().query(&query.sql, &query.params)?;
        Ok(ResultSet {
            records: rows.iter().map(to_record).collect::<Result<_>>()?,
            page_number: page.number(),
            page_size: page.page_size(),
            record_count,
        })
    }

    /// Loads every row matching `clause`.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be built, the session fails, or
    /// a column cannot be converted.
    pub fn find_all<E: Entity>(
        &self, clause: Where, fields: &Fields, shard: Option<&ShardContext>,
    ) -> Result<Vec<E>> {
        let descriptor = describe::<E>()?;
        let query = SelectBuilder::new(&descriptor, self.table(&descriptor, shard))
            .fields(fields.clone())
            .clause(clause)
            .build(self.source.dialect())?;
        let rows = self.source.session().query(&query.sql, &query.params)?;
        rows.iter().map(to_record).collect()
    }

    /// Loads the first row matching `clause`.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Self::find_all`].
    pub fn find_first<E: Entity>(
        &self, clause: Where, fields: &Fields, shard: Option<&ShardContext>,
    ) -> Result<Option<E>> {
        let set = self.find::<E>(clause, fields, &Page::limit(1), shard)?;
        Ok(set.records.into_iter().next())
    }

    /// Counts rows matching `clause`.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be built or the session fails.
    pub fn count<E: Entity>(&self, clause: Where, shard: Option<&ShardContext>) -> Result<u64> {
        let descriptor = describe::<E>()?;
        let query = SelectBuilder::new(&descriptor, self.table(&descriptor, shard))
            .clause(clause)
            .build_count(self.source.dialect())?;
        self.count_rows(&query)
    }

    fn count_rows(&self, query: &Query) -> Result<u64> {
        let rows = self.source.session().query(&query.sql, &query.params)?;
        rows.first()
            .and_then(Row::first)
            .map_or(Ok(0), u64::from_data_type)
            .map_err(|e| Error::Conversion(format!("count: {e}")))
    }

    /// Executes raw SQL with `?` markers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if markers and values disagree, or the
    /// session's error.
    pub fn execute(&self, sql: &str, params: Params) -> Result<u64> {
        let query = self.raw(sql, params)?;
        Ok(self.source.session().execute(&query.sql, &query.params)?)
    }

    /// Runs a raw query with `?` markers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if markers and values disagree, or the
    /// session's error.
    pub fn query(&self, sql: &str, params: Params) -> Result<Vec<Row>> {
        let query = self.raw(sql, params)?;
        Ok(self.source.session().query(&query.sql, &query.params)?)
    }

    fn raw(&self, sql: &str, params: Params) -> Result<Query> {
        let fragment = Fragment::new(sql, params);
        fragment.validate()?;
        Ok(Query {
            params: fragment.params.to_data_types()?,
            sql: self.source.dialect().render_placeholders(fragment.sql),
        })
    }
}

fn to_record<E: Entity>(row: &Row) -> Result<E> {
    E::from_row(row).map_err(|e| Error::Conversion(format!("{}: {e}", E::TYPE_NAME)))
}

/// Key values of `record`, in key order.
pub(crate) fn key_values<E: Entity>(descriptor: &EntityDescriptor, record: &E) -> Vec<Value> {
    let values = record.__to_values();
    descriptor
        .primary_keys()
        .iter()
        .filter_map(|key| descriptor.property(key))
        .filter_map(|property| {
            values
                .iter()
                .find(|(field, _)| *field == property.field())
                .map(|(_, value)| value.clone())
        })
        .collect()
}
