//! SQL function expressions.

use sea_query::Value;

use crate::params::Params;

/// A function call whose arguments are columns, bound values or nested calls.
///
/// Bound arguments render as `?` and travel with the expression, so a function
/// used inside a [`crate::Cond`] contributes its values in argument order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Func {
    name: String,
    args: Vec<String>,
    params: Params,
}

impl Func {
    /// Call of `name` with no arguments yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a column (or other literal SQL) argument.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.args.push(column.into());
        self
    }

    /// Appends a bound argument.
    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.args.push("?".to_string());
        self.params.push(value);
        self
    }

    /// Appends a nested call.
    #[must_use]
    pub fn func(mut self, inner: Self) -> Self {
        self.args.push(inner.sql());
        self.params.append(inner.params);
        self
    }

    /// `COUNT(column)`
    pub fn count(column: impl Into<String>) -> Self {
        Self::new("COUNT").column(column)
    }

    /// `SUM(column)`
    pub fn sum(column: impl Into<String>) -> Self {
        Self::new("SUM").column(column)
    }

    /// `MAX(column)`
    pub fn max(column: impl Into<String>) -> Self {
        Self::new("MAX").column(column)
    }

    /// `MIN(column)`
    pub fn min(column: impl Into<String>) -> Self {
        Self::new("MIN").column(column)
    }

    /// `AVG(column)`
    pub fn avg(column: impl Into<String>) -> Self {
        Self::new("AVG").column(column)
    }

    /// `LOWER(column)`
    pub fn lower(column: impl Into<String>) -> Self {
        Self::new("LOWER").column(column)
    }

    /// `UPPER(column)`
    pub fn upper(column: impl Into<String>) -> Self {
        Self::new("UPPER").column(column)
    }

    /// `COALESCE(column, ?)`
    pub fn coalesce(column: impl Into<String>, fallback: impl Into<Value>) -> Self {
        Self::new("COALESCE").column(column).value(fallback)
    }

    /// Rendered call.
    #[must_use]
    pub fn sql(&self) -> String {
        format!("{}({})", self.name, self.args.join(", "))
    }

    /// Bound arguments in order.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Rendered call and its bound arguments.
    #[must_use]
    pub fn into_parts(self) -> (String, Params) {
        (self.sql(), self.params)
    }
}
