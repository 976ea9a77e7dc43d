//! Where clause: predicate, grouping and ordering of a select.

use sea_query::Order;

use crate::cond::Cond;
use crate::fields::Fields;
use crate::params::Params;

/// Ordering terms, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    terms: Vec<(String, Order)>,
}

impl OrderBy {
    /// No ordering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ascending on `column`.
    #[must_use]
    pub fn asc(mut self, column: impl Into<String>) -> Self {
        self.terms.push((column.into(), Order::Asc));
        self
    }

    /// Descending on `column`.
    #[must_use]
    pub fn desc(mut self, column: impl Into<String>) -> Self {
        self.terms.push((column.into(), Order::Desc));
        self
    }

    /// Appends the terms of `other`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.terms.extend(other.terms);
        self
    }

    /// Terms in order.
    #[must_use]
    pub fn terms(&self) -> &[(String, Order)] {
        &self.terms
    }

    /// Whether no terms were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Grouping fields and an optional `HAVING` predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupBy {
    fields: Fields,
    having: Cond,
}

impl GroupBy {
    /// Group on `fields`.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            having: Cond::new(),
        }
    }

    /// Sets the `HAVING` predicate.
    #[must_use]
    pub fn having(mut self, having: Cond) -> Self {
        self.having = having;
        self
    }

    /// Grouping fields.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// `HAVING` predicate, empty when none.
    #[must_use]
    pub const fn having_cond(&self) -> &Cond {
        &self.having
    }

    /// Whether there is nothing to group on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Concatenates fields and AND-joins the `HAVING` predicates.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            fields: self.fields.merge(other.fields),
            having: join_and(self.having, other.having),
        }
    }
}

/// Full filter of a select: predicate, grouping and ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    cond: Cond,
    group_by: GroupBy,
    order_by: OrderBy,
}

impl Where {
    /// Empty clause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clause filtering on `cond`.
    #[must_use]
    pub fn from_cond(cond: Cond) -> Self {
        Self {
            cond,
            ..Self::default()
        }
    }

    /// Replaces the predicate.
    #[must_use]
    pub fn cond(mut self, cond: Cond) -> Self {
        self.cond = cond;
        self
    }

    /// Replaces the grouping.
    #[must_use]
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    /// Replaces the ordering.
    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Predicate.
    #[must_use]
    pub const fn predicate(&self) -> &Cond {
        &self.cond
    }

    /// Grouping.
    #[must_use]
    pub const fn grouping(&self) -> &GroupBy {
        &self.group_by
    }

    /// Ordering.
    #[must_use]
    pub const fn ordering(&self) -> &OrderBy {
        &self.order_by
    }

    /// Bind values in statement order: predicate, grouping expressions, then
    /// `HAVING`.
    #[must_use]
    pub fn params(&self) -> Params {
        self.cond
            .params()
            .clone()
            .add_params(self.group_by.fields.params())
            .add_params(self.group_by.having.params().clone())
    }

    /// AND-joins the predicates and concatenates grouping and ordering.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            cond: join_and(self.cond, other.cond),
            group_by: self.group_by.merge(other.group_by),
            order_by: self.order_by.merge(other.order_by),
        }
    }
}

impl From<Cond> for Where {
    fn from(cond: Cond) -> Self {
        Self::from_cond(cond)
    }
}

// `left AND (right)`, or whichever side is non-empty.
pub(crate) fn join_and(left: Cond, right: Cond) -> Cond {
    match (left.is_empty(), right.is_empty()) {
        (_, true) => left,
        (true, false) => right,
        (false, false) => Cond::new().bracket(left).and_cond(right),
    }
}
