//! Differential updates.

use std::sync::Arc;

use sea_query::Value;

use crate::cache::describe;
use crate::convert::is_null_value;
use crate::descriptor::{EntityDescriptor, PropertyDescriptor};
use crate::entity::Entity;
use crate::error::Result;
use crate::executor::Executor;
use crate::fields::Fields;
use crate::sharding::ShardContext;

/// Result of a differential update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<E> {
    /// Nothing changed (or nothing passed the filter); no statement was issued.
    NoOp,
    /// Exactly one row was updated; carries the record as written.
    Updated(E),
    /// The statement affected a number of rows other than one.
    Missed(u64),
}

impl<E> UpdateOutcome<E> {
    /// Rows affected: 0 for a no-op.
    #[must_use]
    pub const fn effect_count(&self) -> u64 {
        match self {
            Self::NoOp => 0,
            Self::Updated(_) => 1,
            Self::Missed(count) => *count,
        }
    }

    /// Whether no statement was issued.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

/// A loaded record paired with a snapshot of its values at load time.
///
/// The snapshot is never written; changes are found by comparing it with the
/// record's current values.
pub struct StateWrapper<E: Entity> {
    record: E,
    descriptor: Arc<EntityDescriptor>,
    snapshot: Vec<(&'static str, Value)>,
    ignore_null: bool,
}

impl<E: Entity> StateWrapper<E> {
    /// Wraps `record`, snapshotting its values. With `ignore_null`, a property
    /// moving to or from `NULL` does not count as changed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if `E`'s declaration is malformed.
    pub fn bind(record: E, ignore_null: bool) -> Result<Self> {
        let descriptor = describe::<E>()?;
        let snapshot = record.__to_values();
        Ok(Self {
            record,
            descriptor,
            snapshot,
            ignore_null,
        })
    }

    /// The live record.
    #[must_use]
    pub const fn record(&self) -> &E {
        &self.record
    }

    /// The live record, for mutation.
    pub fn record_mut(&mut self) -> &mut E {
        &mut self.record
    }

    /// Releases the live record.
    #[must_use]
    pub fn into_record(self) -> E {
        self.record
    }

    fn changed(&self) -> Vec<&PropertyDescriptor> {
        let current = self.record.__to_values();
        let lookup = |values: &[(&'static str, Value)], field: &str| {
            values.iter().find(|(name, _)| *name == field).map(|(_, value)| value.clone())
        };

        self.descriptor
            .properties()
            .iter()
            .filter(|property| {
                let before = lookup(&self.snapshot, property.field());
                let after = lookup(&current, property.field());
                match (before, after) {
                    (Some(before), Some(after)) if before != after => {
                        !(self.ignore_null && (is_null_value(&before) || is_null_value(&after)))
                    }
                    _ => false,
                }
            })
            .collect()
    }

    /// Names of changed properties, in declaration order.
    #[must_use]
    pub fn changed_properties(&self) -> Vec<String> {
        self.changed().into_iter().map(|property| property.name().to_string()).collect()
    }

    /// Inclusion list of the changed properties an update may assign.
    #[must_use]
    pub fn changed_fields(&self) -> Fields {
        self.changed()
            .into_iter()
            .filter(|property| {
                !property.is_primary_key()
                    && !property.is_autoincrement()
                    && !property.is_readonly()
            })
            .map(|property| property.name().to_string())
            .collect()
    }

    /// Updates the changed properties that pass `filter` (see
    /// [`Fields::allows`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be built or the session fails.
    pub fn update(
        self, executor: &Executor<'_>, filter: &Fields, shard: Option<&ShardContext>,
    ) -> Result<UpdateOutcome<E>> {
        let changed = self.changed_within(filter);
        self.apply(executor, &changed, shard)
    }

    /// Updates the changed properties that `select` keeps.
    ///
    /// `select` receives the changed property names and returns the fields to
    /// write: an inclusion list keeps the listed ones, an exclusion list drops
    /// them. An empty inclusion list writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be built or the session fails.
    pub fn update_if(
        self, executor: &Executor<'_>, select: impl FnOnce(&[String]) -> Fields,
        shard: Option<&ShardContext>,
    ) -> Result<UpdateOutcome<E>> {
        let selected = select(self.changed_fields().tokens());
        if selected.is_empty() && !selected.is_excluded() {
            return Ok(UpdateOutcome::NoOp);
        }
        let changed = self.changed_within(&selected);
        self.apply(executor, &changed, shard)
    }

    // Changed properties passing `filter`, in declaration order.
    fn changed_within(&self, filter: &Fields) -> Fields {
        self.changed_fields()
            .tokens()
            .iter()
            .filter(|name| {
                self.descriptor.property(name).is_some_and(|property| {
                    filter.allows_any(&[property.name(), property.field(), property.column()])
                })
            })
            .cloned()
            .collect()
    }

    fn apply(
        self, executor: &Executor<'_>, changed: &Fields, shard: Option<&ShardContext>,
    ) -> Result<UpdateOutcome<E>> {
        if changed.is_empty() {
            tracing::debug!(entity = %self.descriptor.entity_name(), "nothing changed");
            return Ok(UpdateOutcome::NoOp);
        }
        match executor.update(&self.record, changed, shard)? {
            1 => Ok(UpdateOutcome::Updated(self.record)),
            count => Ok(UpdateOutcome::Missed(count)),
        }
    }
}
