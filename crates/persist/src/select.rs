use sea_query::{Alias, Expr, SelectStatement, SimpleExpr, UnionType};

use crate::clause::Where;
use crate::cond::Fragment;
use crate::descriptor::EntityDescriptor;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::fields::Fields;
use crate::join::Join;
use crate::page::Page;
use crate::params::Params;
use crate::query::{Query, render};

/// Builder for SELECT and COUNT statements over one entity table.
///
/// Projected properties are aliased to their field names so rows map straight
/// back onto the record. Values bind in statement order: projection, joins,
/// predicate, grouping, unions, then paging.
#[derive(Debug)]
pub struct SelectBuilder<'a> {
    descriptor: &'a EntityDescriptor,
    table: String,
    alias: Option<String>,
    fields: Fields,
    joins: Vec<Join>,
    clause: Where,
    unions: Vec<(UnionType, SelectBuilder<'a>)>,
    distinct: bool,
    page: Option<Page>,
    lock: bool,
}

impl<'a> SelectBuilder<'a> {
    /// Selects from `table`, the physical name of `descriptor`'s entity.
    pub fn new(descriptor: &'a EntityDescriptor, table: impl Into<String>) -> Self {
        Self {
            descriptor,
            table: table.into(),
            alias: None,
            fields: Fields::new(),
            joins: Vec::new(),
            clause: Where::new(),
            unions: Vec::new(),
            distinct: false,
            page: None,
            lock: false,
        }
    }

    /// Alias for the entity table, for qualifying columns next to joins.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Projection. An empty or exclusion list filters the entity's properties;
    /// an inclusion list is taken token by token, resolving property names to
    /// columns and passing other tokens through.
    #[must_use]
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Adds a joined table.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// `SELECT DISTINCT`.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Predicate, grouping and ordering.
    #[must_use]
    pub fn clause(mut self, clause: impl Into<Where>) -> Self {
        self.clause = clause.into();
        self
    }

    /// Appends `other` with `UNION`, dropping duplicate rows.
    #[must_use]
    pub fn union(mut self, other: Self) -> Self {
        self.unions.push((UnionType::Distinct, other));
        self
    }

    /// Appends `other` with `UNION ALL`.
    #[must_use]
    pub fn union_all(mut self, other: Self) -> Self {
        self.unions.push((UnionType::All, other));
        self
    }

    /// Restricts the result to one page.
    #[must_use]
    pub const fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Adds the dialect's row-lock hint.
    #[must_use]
    pub const fn lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    fn column<'t>(&'t self, token: &'t str) -> &'t str {
        self.descriptor.resolve(token).map_or(token, |property| property.column())
    }

    fn project(&self, select: &mut SelectStatement) -> Result<()> {
        if self.fields.is_empty() || self.fields.is_excluded() {
            for property in self.descriptor.properties() {
                if self.fields.allows_any(&[property.name(), property.field(), property.column()]) {
                    select.expr_as(
                        Expr::col(Alias::new(property.column())),
                        Alias::new(property.field()),
                    );
                }
            }
            return Ok(());
        }

        for (token, params) in self.fields.bound_tokens() {
            match self.descriptor.resolve(token) {
                Some(property) => {
                    select.expr_as(
                        Expr::col(Alias::new(property.column())),
                        Alias::new(property.field()),
                    );
                }
                None => {
                    select.expr(bound_expr(token, params)?);
                }
            }
        }
        Ok(())
    }

    // FROM, joins, predicate and grouping.
    fn source(&self, select: &mut SelectStatement) -> Result<()> {
        match &self.alias {
            Some(alias) => select.from_as(Alias::new(&self.table), Alias::new(alias)),
            None => select.from(Alias::new(&self.table)),
        };
        for join in &self.joins {
            join.apply(select)?;
        }

        if let Some(expr) = self.clause.predicate().clone().build().into_expr()? {
            select.and_where(expr);
        }

        let grouping = self.clause.grouping();
        if !grouping.is_empty() {
            let columns = grouping
                .fields()
                .bound_tokens()
                .map(|(token, params)| bound_expr(self.column(token), params))
                .collect::<Result<Vec<_>>>()?;
            select.add_group_by(columns);
            if let Some(having) = grouping.having_cond().clone().build().into_expr()? {
                select.and_having(having);
            }
        }
        Ok(())
    }

    fn add_unions(&self, select: &mut SelectStatement, dialect: &dyn Dialect) -> Result<()> {
        for (kind, other) in &self.unions {
            select.union(*kind, other.statement(dialect)?);
        }
        Ok(())
    }

    fn statement(&self, dialect: &dyn Dialect) -> Result<SelectStatement> {
        let mut select = sea_query::Query::select();
        if self.distinct {
            select.distinct();
        }
        self.project(&mut select)?;
        self.source(&mut select)?;
        self.add_unions(&mut select, dialect)?;

        for (column, order) in self.clause.ordering().terms() {
            select.order_by_expr(Expr::cust(self.column(column)), order.clone());
        }
        if let Some(page) = &self.page {
            dialect.page(&mut select, page);
        }
        if self.lock {
            dialect.lock(&mut select);
        }
        Ok(select)
    }

    /// Build the SELECT query.
    ///
    /// # Errors
    ///
    /// Returns an error if a predicate's placeholders and values disagree, a
    /// join has no `ON` predicate, or a value has no session representation.
    pub fn build(self, dialect: &dyn Dialect) -> Result<Query> {
        let select = self.statement(dialect)?;
        let query = render(&select, dialect)?;
        tracing::debug!(
            table = %self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "SelectBuilder generated SQL"
        );
        Ok(query)
    }

    /// Build a `COUNT(*)` over the rows the SELECT would return, ignoring
    /// ordering and paging. Grouped, distinct and union selects are counted
    /// through a subquery.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Self::build`].
    pub fn build_count(self, dialect: &dyn Dialect) -> Result<Query> {
        let projected = self.distinct || !self.unions.is_empty();
        let mut inner = sea_query::Query::select();
        let count = if self.clause.grouping().is_empty() && !projected {
            inner.expr(Expr::cust("COUNT(*)"));
            self.source(&mut inner)?;
            inner
        } else {
            if projected {
                if self.distinct {
                    inner.distinct();
                }
                self.project(&mut inner)?;
            } else {
                inner.expr(Expr::cust("1"));
            }
            self.source(&mut inner)?;
            self.add_unions(&mut inner, dialect)?;
            let mut outer = sea_query::Query::select();
            outer.expr(Expr::cust("COUNT(*)")).from_subquery(inner, Alias::new("grouped"));
            outer
        };

        let query = render(&count, dialect)?;
        tracing::debug!(
            table = %self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "SelectBuilder generated count SQL"
        );
        Ok(query)
    }
}

// Expression token with its bound values; markers and values must agree.
fn bound_expr(token: &str, params: &Params) -> Result<SimpleExpr> {
    let fragment = Fragment::new(token, params.clone());
    fragment.validate()?;
    Ok(Expr::cust_with_values(fragment.sql, fragment.params))
}
