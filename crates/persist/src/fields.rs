//! Ordered projection lists.

use crate::func::Func;
use crate::params::Params;

/// Ordered projection tokens plus an inclusion/exclusion flag.
///
/// Tokens are bare names, qualified names (`o.user_name`), aliased names
/// (`o.user_name uname`) or rendered expressions. An expression token keeps
/// the values bound to its `?` markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    tokens: Vec<String>,
    bound: Vec<Params>,
    excluded: bool,
}

impl Fields {
    /// Empty inclusion list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusion list of `names`.
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = names.into_iter().map(Into::into).collect();
        Self {
            bound: vec![Params::new(); tokens.len()],
            tokens,
            excluded: false,
        }
    }

    /// Exclusion list of `names`.
    pub fn excluding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(names).excluded(true)
    }

    /// Sets whether the list names fields to exclude.
    #[must_use]
    pub const fn excluded(mut self, excluded: bool) -> Self {
        self.excluded = excluded;
        self
    }

    /// Appends a token.
    #[must_use]
    pub fn add(self, token: impl Into<String>) -> Self {
        self.add_bound(token, Params::new())
    }

    fn add_bound(mut self, token: impl Into<String>, params: Params) -> Self {
        self.tokens.push(token.into());
        self.bound.push(params);
        self
    }

    /// Appends `prefix.field`.
    #[must_use]
    pub fn add_prefixed(self, prefix: &str, field: &str) -> Self {
        self.add(Self::field(prefix, field))
    }

    /// Appends `prefix.field alias`.
    #[must_use]
    pub fn add_aliased(self, prefix: &str, field: &str, alias: &str) -> Self {
        self.add(Self::alias(&Self::field(prefix, field), alias))
    }

    /// Appends a function expression together with its bound arguments.
    #[must_use]
    pub fn add_func(self, func: &Func) -> Self {
        self.add_bound(func.sql(), func.params().clone())
    }

    /// Concatenates `other` and adopts its `excluded` flag.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.tokens.extend(other.tokens);
        self.bound.extend(other.bound);
        self.excluded = other.excluded;
        self
    }

    /// Whether the list names fields to exclude.
    #[must_use]
    pub const fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Whether `token` is in the list.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Whether `name` passes the list as a filter: an empty list passes
    /// everything, an inclusion list passes listed names, an exclusion list
    /// passes the rest.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        self.tokens.is_empty() || self.excluded != self.contains(name)
    }

    /// Whether any of `names` passes the list as a filter.
    #[must_use]
    pub fn allows_any(&self, names: &[&str]) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        if self.excluded {
            names.iter().all(|name| !self.contains(name))
        } else {
            names.iter().any(|name| self.contains(name))
        }
    }

    /// Tokens in order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens paired with the values bound to their markers.
    pub fn bound_tokens(&self) -> impl Iterator<Item = (&str, &Params)> {
        self.tokens.iter().map(String::as_str).zip(&self.bound)
    }

    /// Values bound across all tokens, in token order.
    #[must_use]
    pub fn params(&self) -> Params {
        self.bound.iter().cloned().fold(Params::new(), Params::add_params)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the list has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens joined with `, `.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.tokens.join(", ")
    }

    /// `prefix.field`, or `field` when `prefix` is blank.
    #[must_use]
    pub fn field(prefix: &str, field: &str) -> String {
        if prefix.trim().is_empty() { field.to_string() } else { format!("{prefix}.{field}") }
    }

    /// `field alias`, or `field` when `alias` is blank.
    #[must_use]
    pub fn alias(field: &str, alias: &str) -> String {
        if alias.trim().is_empty() { field.to_string() } else { format!("{field} {alias}") }
    }
}

impl<S: Into<String>> FromIterator<S> for Fields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::of(iter)
    }
}

impl<'a> IntoIterator for &'a Fields {
    type IntoIter = std::slice::Iter<'a, String>;
    type Item = &'a String;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
