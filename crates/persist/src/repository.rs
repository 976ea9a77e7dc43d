//! CRUD orchestration over named data sources.

use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::Value;

use crate::cache::describe;
use crate::clause::{OrderBy, Where, join_and};
use crate::cond::Cond;
use crate::convert::{data_type_to_json, value_to_data_type};
use crate::descriptor::EntityDescriptor;
use crate::entity::{Column, Entity, Payload};
use crate::error::{Error, Result};
use crate::executor::{Executor, key_values};
use crate::fields::Fields;
use crate::outcome::{ErrorCode, Outcome};
use crate::page::{Page, ResultSet};
use crate::params::Params;
use crate::session::{DataSource, Database};
use crate::sharding::ShardContext;
use crate::state::{StateWrapper, UpdateOutcome};

/// Veto points around repository writes.
///
/// Hooks run synchronously before the statement is built. Returning an
/// [`ErrorCode`] stops the write; no statement reaches the session.
pub trait Hooks<E>: Send + Sync {
    /// Called with the populated record before it is inserted.
    ///
    /// # Errors
    ///
    /// Returns the reason the insert is refused.
    fn before_create(
        &self, _source: &DataSource, _record: &mut E, _payload: &dyn Payload,
    ) -> std::result::Result<(), ErrorCode> {
        Ok(())
    }

    /// Called with the changed record before it is updated. Not called when the
    /// payload changes nothing.
    ///
    /// # Errors
    ///
    /// Returns the reason the update is refused.
    fn before_update(
        &self, _source: &DataSource, _record: &mut E, _payload: &dyn Payload,
    ) -> std::result::Result<(), ErrorCode> {
        Ok(())
    }
}

/// Hooks that never veto.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<E> Hooks<E> for NoHooks {}

/// Outcome of a write plus the record as written, when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Saved<E> {
    /// Success or veto, with `id` or `effectCount` attributes.
    pub outcome: Outcome,
    /// The record as written. `None` when vetoed or when the key was missing.
    pub record: Option<E>,
}

/// Selection for multi-row reads.
///
/// `cond` and `extra` are joined with `AND` only when both are non-empty.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    cond: Cond,
    extra: Cond,
    order: OrderBy,
    excluded: Fields,
    page: Option<Page>,
    shard: Option<ShardContext>,
}

impl Criteria {
    /// Matches every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Main predicate.
    #[must_use]
    pub fn cond(mut self, cond: Cond) -> Self {
        self.cond = cond;
        self
    }

    /// Additional predicate, usually supplied by the caller's context.
    #[must_use]
    pub fn extra(mut self, extra: Cond) -> Self {
        self.extra = extra;
        self
    }

    /// Ordering.
    #[must_use]
    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = order;
        self
    }

    /// Properties left out of the projection.
    #[must_use]
    pub fn excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = Fields::excluding(names);
        self
    }

    /// Page to load. Without one every matching row is loaded.
    #[must_use]
    pub const fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Partition to read.
    #[must_use]
    pub fn shard(mut self, shard: ShardContext) -> Self {
        self.shard = Some(shard);
        self
    }

    fn into_parts(self) -> (Where, Fields, Option<Page>, Option<ShardContext>) {
        let clause = Where::from_cond(join_and(self.cond, self.extra)).order_by(self.order);
        (clause, self.excluded, self.page, self.shard)
    }
}

/// Create, update, read and remove records of `E` on named data sources.
///
/// `ds` names the data source; `None` selects the configured default. `shard`
/// picks the partition of sharded entities and is ignored by the others.
pub struct CrudRepository<E: Entity, H: Hooks<E> = NoHooks> {
    database: Arc<Database>,
    hooks: H,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CrudRepository<E> {
    /// Repository without hooks.
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self::with_hooks(database, NoHooks)
    }
}

impl<E: Entity, H: Hooks<E>> CrudRepository<E, H> {
    /// Repository consulting `hooks` before writes.
    #[must_use]
    pub const fn with_hooks(database: Arc<Database>, hooks: H) -> Self {
        Self {
            database,
            hooks,
            _entity: PhantomData,
        }
    }

    /// The data sources this repository resolves names against.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Hooks consulted before writes.
    #[must_use]
    pub const fn hooks(&self) -> &H {
        &self.hooks
    }

    fn executor(&self, ds: Option<&str>) -> Result<Executor<'_>> {
        Ok(Executor::new(self.database.source(ds)?))
    }

    /// Builds a record from `payload` and inserts the properties passing
    /// `filter`. The outcome's `id` attribute carries the key; composite keys
    /// are reported as an array.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source is unknown, the entity is a view, a
    /// payload value cannot be converted, or the session fails. A veto is not
    /// an error.
    #[tracing::instrument(skip_all, fields(entity = E::TYPE_NAME))]
    pub fn create(
        &self, ds: Option<&str>, payload: &dyn Payload, filter: &Fields,
        shard: Option<&ShardContext>,
    ) -> Result<Saved<E>> {
        let executor = self.executor(ds)?;
        let descriptor = describe::<E>()?;
        descriptor.ensure_writable()?;

        let mut record = E::default();
        apply_payload(&descriptor, &mut record, payload, true)?;
        if let Err(code) = self.hooks.before_create(executor.source(), &mut record, payload) {
            tracing::debug!(code = code.code(), "create vetoed");
            return Ok(Saved {
                outcome: Outcome::failure(code),
                record: None,
            });
        }

        executor.insert(&mut record, filter, shard)?;
        let id = key_json(key_values(&descriptor, &record))?;
        Ok(Saved {
            outcome: Outcome::succeed().attr("id", id),
            record: Some(record),
        })
    }

    /// Loads the row keyed by `key` with a row lock, applies `payload` and
    /// writes only the properties that changed and pass `filter`.
    ///
    /// With `ignore_null`, changes to or from `NULL` are not written. The
    /// outcome's `effectCount` is 0 when the key is missing or nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source is unknown, `key` does not match the
    /// entity's key, a payload value cannot be converted, or the session fails.
    #[tracing::instrument(skip_all, fields(entity = E::TYPE_NAME))]
    pub fn update<K: Column>(
        &self, ds: Option<&str>, key: &K, payload: &dyn Payload, filter: &Fields, ignore_null: bool,
        shard: Option<&ShardContext>,
    ) -> Result<Saved<E>> {
        let executor = self.executor(ds)?;
        let descriptor = describe::<E>()?;
        descriptor.ensure_writable()?;

        let Some(current) = executor.find_by_key::<E, K>(key, &Fields::new(), true, shard)? else {
            tracing::debug!("no row for key");
            return Ok(Saved {
                outcome: Outcome::succeed().attr("effectCount", 0),
                record: None,
            });
        };

        let mut wrapper = StateWrapper::bind(current, ignore_null)?;
        apply_payload(&descriptor, wrapper.record_mut(), payload, false)?;
        if wrapper.changed_properties().is_empty() {
            return Ok(Saved {
                outcome: Outcome::succeed().attr("effectCount", 0),
                record: Some(wrapper.into_record()),
            });
        }
        if let Err(code) =
            self.hooks.before_update(executor.source(), wrapper.record_mut(), payload)
        {
            tracing::debug!(code = code.code(), "update vetoed");
            return Ok(Saved {
                outcome: Outcome::failure(code),
                record: None,
            });
        }

        let outcome = wrapper.update(&executor, filter, shard)?;
        let effect_count = outcome.effect_count();
        let record = match outcome {
            UpdateOutcome::Updated(record) => Some(record),
            UpdateOutcome::NoOp | UpdateOutcome::Missed(_) => None,
        };
        Ok(Saved {
            outcome: Outcome::succeed().attr("effectCount", effect_count),
            record,
        })
    }

    /// Sets `fields` to `values` on every row in `keys` with one statement
    /// batched per key. Returns the total affected count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if a field is not an updatable property,
    /// `keys` is empty, or `fields` and `values` differ in length.
    #[tracing::instrument(skip_all, fields(entity = E::TYPE_NAME, keys = keys.len()))]
    pub fn update_fields<K: Column>(
        &self, ds: Option<&str>, keys: &[K], fields: &Fields, values: &Params,
        shard: Option<&ShardContext>,
    ) -> Result<u64> {
        let counts = self.executor(ds)?.update_fields::<E, K>(keys, fields, values, shard)?;
        Ok(counts.iter().sum())
    }

    /// Loads the row keyed by `key`, leaving out `excluded` properties.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source is unknown, `key` does not match the
    /// entity's key, or the session fails.
    pub fn find<K: Column>(
        &self, ds: Option<&str>, key: &K, excluded: &[&str], shard: Option<&ShardContext>,
    ) -> Result<Option<E>> {
        let fields = Fields::excluding(excluded.iter().copied());
        self.executor(ds)?.find_by_key::<E, K>(key, &fields, false, shard)
    }

    /// Loads the rows selected by `criteria`.
    ///
    /// Without a page every matching row is returned in a single page with no
    /// total.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source is unknown, a predicate is
    /// malformed, or the session fails.
    pub fn find_all(&self, ds: Option<&str>, criteria: Criteria) -> Result<ResultSet<E>> {
        let executor = self.executor(ds)?;
        let (clause, excluded, page, shard) = criteria.into_parts();
        match page {
            Some(page) => executor.find::<E>(clause, &excluded, &page, shard.as_ref()),
            None => {
                let records = executor.find_all::<E>(clause, &excluded, shard.as_ref())?;
                Ok(ResultSet {
                    page_number: 1,
                    page_size: records.len() as u64,
                    record_count: None,
                    records,
                })
            }
        }
    }

    /// Loads the first row selected by `criteria`. Any page is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Self::find_all`].
    pub fn find_first(&self, ds: Option<&str>, criteria: Criteria) -> Result<Option<E>> {
        let executor = self.executor(ds)?;
        let (clause, excluded, _, shard) = criteria.into_parts();
        executor.find_first::<E>(clause, &excluded, shard.as_ref())
    }

    /// Deletes the row keyed by `key`. The outcome carries `effectCount`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source is unknown, the entity is a view,
    /// `key` does not match the entity's key, or the session fails.
    #[tracing::instrument(skip_all, fields(entity = E::TYPE_NAME))]
    pub fn remove<K: Column>(
        &self, ds: Option<&str>, key: &K, shard: Option<&ShardContext>,
    ) -> Result<Outcome> {
        let count = self.executor(ds)?.delete_by_key::<E, K>(key, shard)?;
        Ok(Outcome::succeed().attr("effectCount", count))
    }

    /// Deletes the rows keyed by `keys` as one batch. The outcome carries the
    /// per-key counts as `effectCounts` and their sum as `effectCount`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] for an empty key list, or the session's
    /// error.
    #[tracing::instrument(skip_all, fields(entity = E::TYPE_NAME, keys = keys.len()))]
    pub fn remove_all<K: Column>(
        &self, ds: Option<&str>, keys: &[K], shard: Option<&ShardContext>,
    ) -> Result<Outcome> {
        let counts = self.executor(ds)?.delete_batch::<E, K>(keys, shard)?;
        let total: u64 = counts.iter().sum();
        Ok(Outcome::succeed().attr("effectCounts", counts).attr("effectCount", total))
    }

    /// Counts rows matching `cond`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source is unknown, the predicate is
    /// malformed, or the session fails.
    pub fn count(&self, ds: Option<&str>, cond: Cond, shard: Option<&ShardContext>) -> Result<u64> {
        self.executor(ds)?.count::<E>(Where::from_cond(cond), shard)
    }
}

// Copies payload values onto `record`, matching property names first and
// field names second. Keys are left alone on update.
fn apply_payload<E: Entity>(
    descriptor: &EntityDescriptor, record: &mut E, payload: &dyn Payload, with_keys: bool,
) -> Result<usize> {
    let mut applied = 0;
    for property in descriptor.properties() {
        if property.is_primary_key() && !with_keys {
            continue;
        }
        let Some(value) =
            payload.value(property.name()).or_else(|| payload.value(property.field()))
        else {
            continue;
        };
        if value.is_null() && !property.is_nullable() {
            continue;
        }
        record
            .__set_value(property.field(), &value)
            .map_err(|e| Error::Conversion(format!("'{}': {e}", property.name())))?;
        applied += 1;
    }
    Ok(applied)
}

fn key_json(values: Vec<Value>) -> Result<serde_json::Value> {
    let mut json = values
        .into_iter()
        .map(|value| value_to_data_type(value).map(|value| data_type_to_json(&value)))
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(|e| Error::Conversion(format!("key: {e}")))?;
    if json.len() == 1 {
        return Ok(json.remove(0));
    }
    Ok(serde_json::Value::Array(json))
}
