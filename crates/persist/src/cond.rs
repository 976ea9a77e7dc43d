//! Compositional SQL predicates.
//!
//! A [`Cond`] keeps a token stream and a parallel [`Params`]. Every builder call
//! appends its tokens and its bound values together, in the order the rendered
//! fragment places their `?` markers, so the two never need reconciling.

use std::fmt;

use sea_query::{Expr, SimpleExpr, Value};

use crate::error::{Error, Result};
use crate::func::Func;
use crate::params::Params;
use crate::query::marker_positions;

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opt {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
}

impl Opt {
    /// SQL spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

/// A rendered, dialect-neutral SQL fragment and its bind values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    /// SQL text using `?` placeholder markers.
    pub sql: String,
    /// Values for the markers, in order.
    pub params: Params,
}

impl Fragment {
    /// Fragment from raw parts.
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Whether the fragment has no SQL.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Checks that the number of `?` markers equals the number of values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] on a mismatch.
    pub fn validate(&self) -> Result<()> {
        let markers = placeholder_count(&self.sql);
        if markers != self.params.len() {
            return Err(Error::Argument(format!(
                "fragment has {markers} placeholders but {} parameters: {}",
                self.params.len(),
                self.sql
            )));
        }
        Ok(())
    }

    /// Validated fragment as a statement expression, `None` when empty.
    pub(crate) fn into_expr(self) -> Result<Option<SimpleExpr>> {
        self.validate()?;
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(Expr::cust_with_values(self.sql, self.params)))
    }
}

/// Number of `?` markers outside quoted literals and identifiers. A doubled
/// `??` is an escaped literal and does not count.
#[must_use]
pub fn placeholder_count(sql: &str) -> usize {
    marker_positions(sql).len()
}

/// Predicate builder.
///
/// # Examples
///
/// ```ignore
/// let cond = Cond::new()
///     .eq("status", "SHIPPED")
///     .and()
///     .bracket(Cond::new().gt("total_amount", 10).or().is_null("discount"));
/// // status = ? AND (total_amount > ? OR discount IS NULL)
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cond {
    tokens: Vec<String>,
    params: Params,
    brackets: bool,
}

impl Cond {
    /// Empty predicate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    fn bind(mut self, token: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tokens.push(token.into());
        self.params.push(value);
        self
    }

    /// `column <opt> ?`
    #[must_use]
    pub fn compare(self, column: &str, opt: Opt, value: impl Into<Value>) -> Self {
        self.bind(format!("{column} {} ?", opt.as_str()), value)
    }

    /// `column <opt> other` with no bound value.
    #[must_use]
    pub fn compare_field(self, column: &str, opt: Opt, other: &str) -> Self {
        self.token(format!("{column} {} {other}", opt.as_str()))
    }

    /// `func(..) <opt> ?`, with the function's own values first.
    #[must_use]
    pub fn compare_func(mut self, func: Func, opt: Opt, value: impl Into<Value>) -> Self {
        let (sql, params) = func.into_parts();
        self.params.append(params);
        self.bind(format!("{sql} {} ?", opt.as_str()), value)
    }

    /// `column = ?`
    #[must_use]
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Opt::Eq, value)
    }

    /// `column <> ?`
    #[must_use]
    pub fn not_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Opt::NotEq, value)
    }

    /// `column < ?`
    #[must_use]
    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Opt::Lt, value)
    }

    /// `column > ?`
    #[must_use]
    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Opt::Gt, value)
    }

    /// `column <= ?`
    #[must_use]
    pub fn lt_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Opt::LtEq, value)
    }

    /// `column >= ?`
    #[must_use]
    pub fn gt_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Opt::GtEq, value)
    }

    /// `column LIKE ?`
    #[must_use]
    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(column, Opt::Like, pattern)
    }

    /// `column NOT LIKE ?`
    #[must_use]
    pub fn not_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(column, Opt::NotLike, pattern)
    }

    /// `column = other`
    #[must_use]
    pub fn eq_field(self, column: &str, other: &str) -> Self {
        self.compare_field(column, Opt::Eq, other)
    }

    /// `column BETWEEN ? AND ?`
    #[must_use]
    pub fn between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.params.push(low);
        self.params.push(high);
        self.token(format!("{column} BETWEEN ? AND ?"))
    }

    /// Open or closed range: `BETWEEN` with both bounds, `>=` or `<=` with one,
    /// nothing with neither.
    #[must_use]
    pub fn range<V: Into<Value>>(self, column: &str, low: Option<V>, high: Option<V>) -> Self {
        match (low, high) {
            (Some(low), Some(high)) => self.between(column, low, high),
            (Some(low), None) => self.gt_eq(column, low),
            (None, Some(high)) => self.lt_eq(column, high),
            (None, None) => self,
        }
    }

    /// `column IN (?, ..)`. An empty list matches nothing.
    #[must_use]
    pub fn in_values<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.in_list(column, "IN", "1 = 0", values)
    }

    /// `column NOT IN (?, ..)`. An empty list matches everything.
    #[must_use]
    pub fn not_in_values<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.in_list(column, "NOT IN", "1 = 1", values)
    }

    fn in_list<I, V>(mut self, column: &str, keyword: &str, when_empty: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Params = values.into_iter().collect();
        if values.is_empty() {
            return self.token(when_empty);
        }
        let markers = vec!["?"; values.len()].join(", ");
        self.params.append(values);
        self.token(format!("{column} {keyword} ({markers})"))
    }

    /// `column IN (sub-query)`
    #[must_use]
    pub fn in_select(mut self, column: &str, query: Fragment) -> Self {
        self.params.append(query.params);
        self.token(format!("{column} IN ({})", query.sql))
    }

    /// `EXISTS (sub-query)`
    #[must_use]
    pub fn exists(mut self, query: Fragment) -> Self {
        self.params.append(query.params);
        self.token(format!("EXISTS ({})", query.sql))
    }

    /// `NOT EXISTS (sub-query)`
    #[must_use]
    pub fn not_exists(mut self, query: Fragment) -> Self {
        self.params.append(query.params);
        self.token(format!("NOT EXISTS ({})", query.sql))
    }

    /// `column IS NULL`
    #[must_use]
    pub fn is_null(self, column: &str) -> Self {
        self.token(format!("{column} IS NULL"))
    }

    /// `column IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, column: &str) -> Self {
        self.token(format!("{column} IS NOT NULL"))
    }

    /// `1 = 1`, handy as the head of a conditionally built chain.
    #[must_use]
    pub fn eq_one(self) -> Self {
        self.token("1 = 1")
    }

    /// `AND`
    #[must_use]
    pub fn and(self) -> Self {
        self.token("AND")
    }

    /// `OR`
    #[must_use]
    pub fn or(self) -> Self {
        self.token("OR")
    }

    /// `NOT`
    #[must_use]
    pub fn not(self) -> Self {
        self.token("NOT")
    }

    /// `AND` unless the predicate is still empty.
    #[must_use]
    pub fn and_if_need(self) -> Self {
        if self.is_empty() { self } else { self.and() }
    }

    /// `OR` unless the predicate is still empty.
    #[must_use]
    pub fn or_if_need(self) -> Self {
        if self.is_empty() { self } else { self.or() }
    }

    /// `AND (other)`, skipping empty sides.
    #[must_use]
    pub fn and_cond(self, other: Self) -> Self {
        if other.is_empty() {
            return self;
        }
        self.and_if_need().bracket(other)
    }

    /// `OR (other)`, skipping empty sides.
    #[must_use]
    pub fn or_cond(self, other: Self) -> Self {
        if other.is_empty() {
            return self;
        }
        self.or_if_need().bracket(other)
    }

    /// Appends `other` inline, concatenating its values.
    #[must_use]
    pub fn cond(mut self, other: Self) -> Self {
        let fragment = other.build();
        self.params.append(fragment.params);
        self.token(fragment.sql)
    }

    /// Appends `(other)`, concatenating its values.
    #[must_use]
    pub fn bracket(mut self, other: Self) -> Self {
        let fragment = other.build();
        self.params.append(fragment.params);
        self.token(format!("({})", fragment.sql))
    }

    /// Appends raw SQL that carries no placeholders.
    #[must_use]
    pub fn raw(self, sql: impl Into<String>) -> Self {
        self.token(sql)
    }

    /// Appends raw SQL and the values for its placeholders.
    #[must_use]
    pub fn raw_with(mut self, sql: impl Into<String>, params: Params) -> Self {
        self.params.append(params);
        self.token(sql)
    }

    /// Applies `build` when `condition` holds.
    #[must_use]
    pub fn when(self, condition: bool, build: impl FnOnce(Self) -> Self) -> Self {
        if condition { build(self) } else { self }
    }

    /// Applies `build` with the value when it is present.
    #[must_use]
    pub fn when_some<T>(self, value: Option<T>, build: impl FnOnce(Self, T) -> Self) -> Self {
        match value {
            Some(value) => build(self, value),
            None => self,
        }
    }

    /// Wraps the whole predicate in parentheses when rendered.
    #[must_use]
    pub const fn brackets(mut self) -> Self {
        self.brackets = true;
        self
    }

    /// Whether no tokens have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Values accumulated so far.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Rendered SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let sql = self.tokens.join(" ");
        if self.brackets && !sql.is_empty() { format!("({sql})") } else { sql }
    }

    /// Renders the predicate and its values.
    #[must_use]
    pub fn build(self) -> Fragment {
        Fragment {
            sql: self.to_sql(),
            params: self.params,
        }
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
