//! Positional bind values.

use sea_query::Value;

use crate::convert::value_to_data_type;
use crate::error::{Error, Result};
use crate::types::DataType;

/// Ordered bind values.
///
/// Adding a nested list or a collection flattens it in iteration order, so the
/// list always lines up with the placeholders of the fragment it belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Vec<Value>,
}

impl Params {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scalar value.
    #[must_use]
    pub fn add(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    /// Appends every value of `values`, in order.
    #[must_use]
    pub fn add_all<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    /// Appends a nested list, flattened.
    #[must_use]
    pub fn add_params(mut self, other: Self) -> Self {
        self.append(other);
        self
    }

    /// Appends a scalar value in place.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    /// Appends a nested list in place, flattened.
    pub fn append(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Values in order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Session representation of the values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] for values without a session representation.
    pub fn to_data_types(&self) -> Result<Vec<DataType>> {
        self.values
            .iter()
            .cloned()
            .map(|value| value_to_data_type(value).map_err(|e| Error::Conversion(e.to_string())))
            .collect()
    }
}

impl<V: Into<Value>> FromIterator<V> for Params {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new().add_all(iter)
    }
}

impl<V: Into<Value>> Extend<V> for Params {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        self.values.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for Params {
    type IntoIter = std::vec::IntoIter<Value>;
    type Item = Value;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
