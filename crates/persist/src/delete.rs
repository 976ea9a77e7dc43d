use sea_query::Alias;

use crate::cond::Cond;
use crate::descriptor::EntityDescriptor;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::query::{Query, render};

/// Builder for constructing DELETE queries.
#[derive(Debug)]
pub struct DeleteBuilder<'a> {
    descriptor: &'a EntityDescriptor,
    table: String,
    filter: Cond,
}

impl<'a> DeleteBuilder<'a> {
    /// Deletes from `table`, the physical name of `descriptor`'s entity.
    pub fn new(descriptor: &'a EntityDescriptor, table: impl Into<String>) -> Self {
        Self {
            descriptor,
            table: table.into(),
            filter: Cond::new(),
        }
    }

    /// Restricts the delete to rows matching `filter`.
    #[must_use]
    pub fn filter(mut self, filter: Cond) -> Self {
        self.filter = filter;
        self
    }

    /// Build the DELETE query.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is a view, the filter is empty, or its
    /// placeholders and values disagree.
    pub fn build(self, dialect: &dyn Dialect) -> Result<Query> {
        self.descriptor.ensure_writable()?;

        let mut statement = sea_query::Query::delete();
        statement.from_table(Alias::new(&self.table));
        let Some(expr) = self.filter.build().into_expr()? else {
            return Err(crate::argument_error!(
                "refusing to delete every row of '{}'",
                self.descriptor.entity_name()
            ));
        };
        statement.and_where(expr);

        let query = render(&statement, dialect)?;
        tracing::debug!(
            table = %self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "DeleteBuilder generated SQL"
        );
        Ok(query)
    }
}
