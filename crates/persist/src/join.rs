//! Joined tables for [`SelectBuilder`](crate::SelectBuilder).

use sea_query::{Alias, JoinType, SelectStatement};

use crate::cond::Cond;
use crate::error::Result;

/// A table joined into a select, with its `ON` predicate.
///
/// `ON` values are bound ahead of the `WHERE` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    kind: JoinKind,
    table: String,
    alias: Option<String>,
    on: Cond,
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
}

impl Join {
    /// Join of `kind` on `table` matching `on`.
    pub fn new(kind: JoinKind, table: impl Into<String>, on: Cond) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: None,
            on,
        }
    }

    /// `INNER JOIN table ON ..`
    pub fn inner(table: impl Into<String>, on: Cond) -> Self {
        Self::new(JoinKind::Inner, table, on)
    }

    /// `LEFT JOIN table ON ..`
    pub fn left(table: impl Into<String>, on: Cond) -> Self {
        Self::new(JoinKind::Left, table, on)
    }

    /// `RIGHT JOIN table ON ..`
    pub fn right(table: impl Into<String>, on: Cond) -> Self {
        Self::new(JoinKind::Right, table, on)
    }

    /// Sets an alias for the joined table.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Join type.
    #[must_use]
    pub const fn kind(&self) -> JoinKind {
        self.kind
    }

    /// Joined table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// `ON` predicate.
    #[must_use]
    pub const fn on(&self) -> &Cond {
        &self.on
    }

    /// Adds the join to `select`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`](crate::Error::Argument) when the `ON`
    /// predicate is empty or its placeholders and values disagree.
    pub(crate) fn apply(&self, select: &mut SelectStatement) -> Result<()> {
        let Some(on) = self.on.clone().build().into_expr()? else {
            return Err(crate::argument_error!("join on '{}' has no ON predicate", self.table));
        };
        let kind = self.kind.into_join_type();
        match &self.alias {
            Some(alias) => select.join_as(kind, Alias::new(&self.table), Alias::new(alias), on),
            None => select.join(kind, Alias::new(&self.table), on),
        };
        Ok(())
    }
}

impl JoinKind {
    const fn into_join_type(self) -> JoinType {
        match self {
            Self::Inner => JoinType::InnerJoin,
            Self::Left => JoinType::LeftJoin,
            Self::Right => JoinType::RightJoin,
        }
    }
}
