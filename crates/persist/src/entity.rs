//! Entity declarations: the `entity!` and `record!` macros and the traits they
//! implement for reading and writing field values.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_query::Value;

use crate::convert::{FetchValue, StorageType, json_to_data_type};
use crate::descriptor::Declaration;
use crate::types::{DataType, Row};

/// Declares a persistent entity with automatic `Entity` trait implementation.
///
/// The table name defaults to the struct name in storage form (`OrderItem`
/// becomes `order_item`). Per-property markers, the primary key and indexes are
/// supplied through `declare`, a non-capturing closure over [`Declaration`].
///
/// Entities must implement `Default`; records are materialised by assigning
/// row values over a default instance.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "orders",
///     declare = |d| d
///         .primary_key("order_id")
///         .property("order_id", |p| p.autoincrement())
///         .index("ix_user", &["user_name"]),
///     #[derive(Debug, Clone, Default)]
///     pub struct Order {
///         pub order_id: i64,
///         pub user_name: String,
///         pub total_amount: f64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    // Single code-generation arm
    (
        @impl [$($table:literal)?] [$declare:expr]
        $(#[$meta:meta])*
        pub struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        pub struct $struct_name {
            $(
                $(#[$field_meta])*
                pub $field_name : $field_type
            ),*
        }

        impl $crate::Entity for $struct_name {
            const TYPE_NAME: &'static str = stringify!($struct_name);

            fn fields() -> Vec<$crate::FieldSpec> {
                vec![
                    $(
                        $crate::FieldSpec {
                            name: stringify!($field_name),
                            members: <$field_type as $crate::Column>::MEMBERS,
                            nullable: <$field_type as $crate::Column>::NULLABLE,
                            storage_type: <$field_type as $crate::Column>::storage_type(),
                        },
                    )*
                ]
            }

            fn declaration() -> $crate::Declaration {
                let declare: fn($crate::Declaration) -> $crate::Declaration = $declare;
                declare($crate::Declaration::default() $(.name($table))?)
            }
        }

        impl $crate::EntityValues for $struct_name {
            fn __to_values(&self) -> Vec<(&'static str, $crate::__private::Value)> {
                let mut values = Vec::new();
                $(
                    $crate::Column::push_values(&self.$field_name, stringify!($field_name), &mut values);
                )*
                values
            }

            fn __set_value(&mut self, field: &str, value: &$crate::DataType) -> $crate::__private::Result<bool> {
                $(
                    if $crate::Column::assign(&mut self.$field_name, stringify!($field_name), field, value)? {
                        return Ok(true);
                    }
                )*
                Ok(false)
            }
        }
    };

    // Table and declaration
    (
        table = $table:literal,
        declare = $declare:expr,
        $($rest:tt)*
    ) => {
        $crate::entity! { @impl [$table] [$declare] $($rest)* }
    };

    // Declaration only → table derived from the struct name
    (
        declare = $declare:expr,
        $($rest:tt)*
    ) => {
        $crate::entity! { @impl [] [$declare] $($rest)* }
    };

    // Bare table → no per-property markers
    (
        table = $table:literal,
        $($rest:tt)*
    ) => {
        $crate::entity! { @impl [$table] [|d| d] $($rest)* }
    };
}

/// Declares a structured record whose fields flatten into the owning entity.
///
/// Used for composite primary keys: the entity names the record-typed field as
/// its key and each member becomes a key property, in declaration order.
///
/// # Examples
///
/// ```ignore
/// record! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct OrderLineKey {
///         pub order_id: i64,
///         pub line_no: i32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        pub struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        pub struct $struct_name {
            $(
                $(#[$field_meta])*
                pub $field_name : $field_type
            ),*
        }

        impl $crate::Column for $struct_name {
            const MEMBERS: &'static [&'static str] = &[ $( stringify!($field_name) ),* ];

            fn push_values(&self, _name: &'static str, out: &mut Vec<(&'static str, $crate::__private::Value)>) {
                $(
                    $crate::Column::push_values(&self.$field_name, stringify!($field_name), out);
                )*
            }

            fn assign(&mut self, _name: &'static str, field: &str, value: &$crate::DataType) -> $crate::__private::Result<bool> {
                $(
                    if $crate::Column::assign(&mut self.$field_name, stringify!($field_name), field, value)? {
                        return Ok(true);
                    }
                )*
                Ok(false)
            }
        }
    };
}

/// Structural facts about one declared struct field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field (accessor) name.
    pub name: &'static str,
    /// Member names when the field is a structured record; empty for scalars.
    pub members: &'static [&'static str],
    /// Whether the field type admits `NULL`.
    pub nullable: bool,
    /// Storage type implied by the field's Rust type.
    pub storage_type: StorageType,
}

/// Trait for persistent entities.
///
/// Typically implemented via the `entity!` macro rather than manually.
pub trait Entity: EntityValues + Default + Send + Sync + 'static {
    /// Rust type name, used to derive the entity name.
    const TYPE_NAME: &'static str;

    /// Declared fields in declaration order.
    fn fields() -> Vec<FieldSpec>;

    /// Entity, property, key and index markers.
    fn declaration() -> Declaration;

    /// Construct an entity instance from a row keyed by field names.
    ///
    /// Fields absent from the row keep their default value.
    ///
    /// # Errors
    ///
    /// Returns an error if a column value cannot be converted to its field type.
    fn from_row(row: &Row) -> Result<Self> {
        let mut entity = Self::default();
        for field in &row.fields {
            entity.__set_value(&field.name, &field.value)?;
        }
        Ok(entity)
    }
}

/// Internal trait for reading and writing entity values. Automatically implemented by the `entity!` macro.
#[doc(hidden)]
pub trait EntityValues {
    fn __to_values(&self) -> Vec<(&'static str, Value)>;

    fn __set_value(&mut self, field: &str, value: &DataType) -> Result<bool>;
}

/// A type that can occupy an entity field: a scalar column or a `record!` struct.
pub trait Column: Sized {
    /// Member names of a structured record. Empty for scalars.
    const MEMBERS: &'static [&'static str] = &[];

    /// Whether the type admits `NULL`.
    const NULLABLE: bool = false;

    /// Storage type implied by the Rust type.
    #[must_use]
    fn storage_type() -> StorageType {
        StorageType::Unknown
    }

    /// Append `(field, value)` pairs for this column, flattening records.
    fn push_values(&self, name: &'static str, out: &mut Vec<(&'static str, Value)>);

    /// Assign `value` if `field` names this column (or one of its members).
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted to the column type.
    fn assign(&mut self, name: &'static str, field: &str, value: &DataType) -> Result<bool>;

    /// Bind values of this column in flattened order.
    #[must_use]
    fn values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.push_values("", &mut out);
        out.into_iter().map(|(_, value)| value).collect()
    }
}

macro_rules! scalar_column {
    ($($ty:ty => $storage:expr),* $(,)?) => {
        $(
            impl Column for $ty {
                fn storage_type() -> StorageType {
                    $storage
                }

                fn push_values(&self, name: &'static str, out: &mut Vec<(&'static str, Value)>) {
                    out.push((name, self.clone().into()));
                }

                fn assign(
                    &mut self, name: &'static str, field: &str, value: &DataType,
                ) -> Result<bool> {
                    if field != name {
                        return Ok(false);
                    }
                    *self = <$ty as FetchValue>::from_data_type(value)?;
                    Ok(true)
                }
            }

            impl Column for Option<$ty> {
                const NULLABLE: bool = true;

                fn storage_type() -> StorageType {
                    $storage
                }

                fn push_values(&self, name: &'static str, out: &mut Vec<(&'static str, Value)>) {
                    out.push((name, self.clone().into()));
                }

                fn assign(
                    &mut self, name: &'static str, field: &str, value: &DataType,
                ) -> Result<bool> {
                    if field != name {
                        return Ok(false);
                    }
                    *self = <Self as FetchValue>::from_data_type(value)?;
                    Ok(true)
                }
            }
        )*
    };
}

scalar_column! {
    bool => StorageType::Boolean,
    i16 => StorageType::SmallInt,
    i32 => StorageType::Integer,
    i64 => StorageType::BigInt,
    u32 => StorageType::UnsignedInteger,
    u64 => StorageType::UnsignedBigInt,
    f32 => StorageType::Float,
    f64 => StorageType::Double,
    String => StorageType::Varchar,
    Vec<u8> => StorageType::Binary,
    NaiveDate => StorageType::Date,
    NaiveTime => StorageType::Time,
    NaiveDateTime => StorageType::Timestamp,
    DateTime<Utc> => StorageType::Timestamp,
}

/// Source of property values for create and update operations.
///
/// Values are looked up by property name first, then by field name.
pub trait Payload {
    /// Value supplied for `name`, if any.
    fn value(&self, name: &str) -> Option<DataType>;
}

impl Payload for serde_json::Map<String, serde_json::Value> {
    fn value(&self, name: &str) -> Option<DataType> {
        self.get(name).map(json_to_data_type)
    }
}

impl Payload for serde_json::Value {
    fn value(&self, name: &str) -> Option<DataType> {
        self.as_object().and_then(|object| object.value(name))
    }
}

impl Payload for HashMap<String, DataType> {
    fn value(&self, name: &str) -> Option<DataType> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_assign_matches_own_name_only() {
        let mut amount = 0.0_f64;
        assert!(!amount.assign("total_amount", "user_name", &DataType::Double(Some(1.0))).unwrap());
        assert!(amount.assign("total_amount", "total_amount", &DataType::Int64(Some(20))).unwrap());
        assert!((amount - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn optional_column_accepts_null() {
        let mut nickname = Some("bob".to_string());
        assert!(nickname.assign("nickname", "nickname", &DataType::Str(None)).unwrap());
        assert_eq!(nickname, None);
        assert!(<Option<String> as Column>::NULLABLE);
        assert!(!<String as Column>::NULLABLE);
    }

    #[test]
    fn scalar_values() {
        assert_eq!(42_i64.values(), vec![Value::BigInt(Some(42))]);
        assert_eq!(<i32 as Column>::storage_type(), StorageType::Integer);
    }

    #[test]
    fn json_payload_lookup() {
        let payload = serde_json::json!({"userName": "bob", "totalAmount": 12.5});
        assert_eq!(payload.value("userName"), Some(DataType::Str(Some("bob".into()))));
        assert_eq!(payload.value("totalAmount"), Some(DataType::Double(Some(12.5))));
        assert_eq!(payload.value("missing"), None);
    }
}
