use sea_query::{Alias, Expr, SimpleExpr, Value};

use crate::convert::{bind_value, convert, data_type_to_value, is_null_value};
use crate::descriptor::{EntityDescriptor, PropertyDescriptor};
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::fields::Fields;
use crate::query::{Query, render};
use crate::types::DataType;

/// Builder for constructing INSERT queries from a record.
///
/// Columns follow the descriptor's property order. Autoincrement properties
/// are left to the database unless they name a sequence; `NULL` values are
/// replaced by the property's declared default.
#[derive(Debug)]
pub struct InsertBuilder<'a> {
    descriptor: &'a EntityDescriptor,
    table: String,
    fields: Fields,
    values: Vec<(&'static str, Value)>,
}

impl<'a> InsertBuilder<'a> {
    /// Inserts into `table`, the physical name of `descriptor`'s entity.
    pub fn new(descriptor: &'a EntityDescriptor, table: impl Into<String>) -> Self {
        Self {
            descriptor,
            table: table.into(),
            fields: Fields::new(),
            values: Vec::new(),
        }
    }

    /// Restricts the inserted columns to properties passing `fields`.
    /// Sequence keys are always inserted.
    #[must_use]
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Populate all fields from an entity instance.
    #[must_use]
    pub fn record<E: Entity>(mut self, record: &E) -> Self {
        self.values = record.__to_values();
        self
    }

    /// Sets the value of the field `field`.
    #[must_use]
    pub fn set(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.values.retain(|(name, _)| *name != field);
        self.values.push((field, value.into()));
        self
    }

    fn column_value(
        &self, property: &PropertyDescriptor, dialect: &dyn Dialect,
    ) -> Result<Option<SimpleExpr>> {
        if property.is_autoincrement() {
            return match property.sequence() {
                Some(sequence) => Ok(Some(Expr::cust(dialect.sequence_next_value(sequence)?))),
                None => Ok(None),
            };
        }
        if !self.fields.allows_any(&[property.name(), property.field(), property.column()]) {
            return Ok(None);
        }

        let Some((_, value)) = self.values.iter().find(|(field, _)| *field == property.field())
        else {
            return Ok(None);
        };

        let value = match property.default_value() {
            Some(default) if is_null_value(value) => {
                let typed =
                    convert(DataType::Str(Some(default.to_string())), property.storage_type())
                        .map_err(|e| {
                            Error::Conversion(format!("default of '{}': {e}", property.name()))
                        })?;
                data_type_to_value(typed)
            }
            _ => value.clone(),
        };
        let value = bind_value(value, property.conversion())
            .map_err(|e| Error::Conversion(format!("'{}': {e}", property.name())))?;
        Ok(Some(SimpleExpr::Value(value)))
    }

    /// Build the INSERT query.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is a view, a sequence is unsupported by the
    /// dialect, or a value cannot be converted.
    pub fn build(self, dialect: &dyn Dialect) -> Result<Query> {
        self.descriptor.ensure_writable()?;

        let mut columns = Vec::new();
        let mut row = Vec::new();
        for property in self.descriptor.properties() {
            if let Some(expr) = self.column_value(property, dialect)? {
                columns.push(Alias::new(property.column()));
                row.push(expr);
            }
        }
        if columns.is_empty() {
            return Err(crate::argument_error!(
                "nothing to insert into '{}'",
                self.descriptor.entity_name()
            ));
        }

        let mut statement = sea_query::Query::insert();
        statement.into_table(Alias::new(&self.table));
        statement.columns(columns);
        statement.values(row)?;
        if dialect.returns_generated_keys()
            && let Some(key) = self.descriptor.generated_key()
        {
            statement.returning_col(Alias::new(key.column()));
        }

        let query = render(&statement, dialect)?;
        tracing::debug!(
            table = %self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "InsertBuilder generated SQL"
        );
        Ok(query)
    }
}
