use sea_query::{Alias, Value};

use crate::cond::Cond;
use crate::convert::bind_value;
use crate::descriptor::{EntityDescriptor, PropertyDescriptor};
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::fields::Fields;
use crate::query::{Query, render};

/// Builder for constructing UPDATE queries.
///
/// Key, autoincrement and readonly properties are never assigned.
#[derive(Debug)]
pub struct UpdateBuilder<'a> {
    descriptor: &'a EntityDescriptor,
    table: String,
    set_clauses: Vec<(String, Value)>,
    filter: Cond,
}

impl<'a> UpdateBuilder<'a> {
    /// Updates `table`, the physical name of `descriptor`'s entity.
    pub fn new(descriptor: &'a EntityDescriptor, table: impl Into<String>) -> Self {
        Self {
            descriptor,
            table: table.into(),
            set_clauses: Vec::new(),
            filter: Cond::new(),
        }
    }

    fn assignable(property: &PropertyDescriptor) -> bool {
        !property.is_primary_key() && !property.is_autoincrement() && !property.is_readonly()
    }

    /// Assigns the record's values for every assignable property that passes
    /// `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if a declared conversion fails.
    pub fn record<E: Entity>(mut self, record: &E, fields: &Fields) -> Result<Self> {
        let values = record.__to_values();
        let descriptor = self.descriptor;
        for property in descriptor.properties() {
            if !Self::assignable(property)
                || !fields.allows_any(&[property.name(), property.field(), property.column()])
            {
                continue;
            }
            if let Some((_, value)) = values.iter().find(|(field, _)| *field == property.field()) {
                let value = bind_value(value.clone(), property.conversion())
                    .map_err(|e| Error::Conversion(format!("'{}': {e}", property.name())))?;
                self.set_clauses.push((property.column().to_string(), value));
            }
        }
        Ok(self)
    }

    /// Assigns `value` to the property (or field, or column) `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if `name` is not an assignable property.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        let descriptor = self.descriptor;
        let property = descriptor
            .resolve(name)
            .filter(|property| Self::assignable(property))
            .ok_or_else(|| {
                crate::argument_error!(
                    "'{}' is not an updatable property of '{}'",
                    name,
                    descriptor.entity_name()
                )
            })?;
        let value = bind_value(value.into(), property.conversion())
            .map_err(|e| Error::Conversion(format!("'{}': {e}", property.name())))?;
        self.set_clauses.push((property.column().to_string(), value));
        Ok(self)
    }

    /// Restricts the update to rows matching `filter`.
    #[must_use]
    pub fn filter(mut self, filter: Cond) -> Self {
        self.filter = filter;
        self
    }

    /// Columns assigned so far, in order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.set_clauses.iter().map(|(column, _)| column.as_str()).collect()
    }

    /// Whether nothing is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set_clauses.is_empty()
    }

    /// Build the UPDATE query.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is a view, nothing is assigned, or the
    /// filter's placeholders and values disagree.
    pub fn build(self, dialect: &dyn Dialect) -> Result<Query> {
        self.descriptor.ensure_writable()?;
        if self.set_clauses.is_empty() {
            return Err(crate::argument_error!(
                "nothing to update on '{}'",
                self.descriptor.entity_name()
            ));
        }

        let mut statement = sea_query::Query::update();
        statement.table(Alias::new(&self.table));
        for (column, value) in self.set_clauses {
            statement.value(Alias::new(column), value);
        }
        if let Some(expr) = self.filter.build().into_expr()? {
            statement.and_where(expr);
        }

        let query = render(&statement, dialect)?;
        tracing::debug!(
            table = %self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "UpdateBuilder generated SQL"
        );
        Ok(query)
    }
}
