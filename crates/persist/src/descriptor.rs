//! Structural description of an entity type.
//!
//! A [`Declaration`] carries the markers an entity declares; building it against
//! the entity's [`FieldSpec`]s yields an immutable [`EntityDescriptor`]. Use
//! [`crate::describe`] rather than building descriptors directly: the cache
//! guarantees one descriptor per type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sea_query::Value;

use crate::cond::Cond;
use crate::convert::StorageType;
use crate::dialect::Dialect;
use crate::entity::{Entity, FieldSpec};
use crate::error::{Error, Result};
use crate::naming::{to_property_name, to_storage_name};
use crate::sharding::ShardingRule;

/// Entity level markers, assembled by the `declare` closure of `entity!`.
#[derive(Clone, Default)]
pub struct Declaration {
    name: Option<String>,
    view: bool,
    comment: Option<String>,
    sharding: Option<Arc<dyn ShardingRule>>,
    primary_key: Option<String>,
    properties: Vec<(String, PropertyDecl)>,
    transient: Vec<String>,
    indexes: Vec<IndexDecl>,
}

#[derive(Clone)]
struct IndexDecl {
    name: String,
    unique: bool,
    fields: Vec<String>,
}

impl Declaration {
    /// Explicit entity (table) name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the entity as a read-only view: no key, no indexes, no writes.
    #[must_use]
    pub const fn view(mut self) -> Self {
        self.view = true;
        self
    }

    /// Entity comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Partition resolution strategy for the entity's table.
    #[must_use]
    pub fn sharding(mut self, rule: Arc<dyn ShardingRule>) -> Self {
        self.sharding = Some(rule);
        self
    }

    /// Field holding the primary key. A `record!` typed field declares a
    /// composite key.
    #[must_use]
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Per-property markers for `field` (or a composite key member).
    #[must_use]
    pub fn property(
        mut self, field: impl Into<String>, declare: impl FnOnce(PropertyDecl) -> PropertyDecl,
    ) -> Self {
        let field = field.into();
        let existing = self.properties.iter().position(|(name, _)| *name == field);
        let decl = existing.map(|pos| self.properties.remove(pos).1).unwrap_or_default();
        self.properties.push((field, declare(decl)));
        self
    }

    /// Excludes `field` from persistence.
    #[must_use]
    pub fn transient(mut self, field: impl Into<String>) -> Self {
        self.transient.push(field.into());
        self
    }

    /// Non-unique index over `fields`.
    #[must_use]
    pub fn index(self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.add_index(name.into(), false, fields)
    }

    /// Unique index over `fields`.
    #[must_use]
    pub fn unique_index(self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.add_index(name.into(), true, fields)
    }

    fn add_index(mut self, name: String, unique: bool, fields: &[&str]) -> Self {
        self.indexes.push(IndexDecl {
            name,
            unique,
            fields: fields.iter().map(ToString::to_string).collect(),
        });
        self
    }

    fn property_decl(&self, field: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|(name, _)| name == field).map(|(_, decl)| decl)
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("view", &self.view)
            .field("primary_key", &self.primary_key)
            .field("sharded", &self.sharding.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-property markers.
#[derive(Debug, Clone, Default)]
pub struct PropertyDecl {
    name: Option<String>,
    column: Option<String>,
    autoincrement: bool,
    sequence: Option<String>,
    nullable: Option<bool>,
    unsigned: bool,
    length: usize,
    decimals: usize,
    storage_type: Option<StorageType>,
    default_value: Option<String>,
    comment: Option<String>,
    readonly: bool,
    conversion: Option<StorageType>,
}

impl PropertyDecl {
    /// Explicit property name. Defaults to the camel form of the column name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Storage column name. Defaults to the field name in storage form.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Value generated by the database on insert.
    #[must_use]
    pub const fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Value drawn from the named sequence on insert. Implies autoincrement.
    #[must_use]
    pub fn sequence(mut self, sequence: impl Into<String>) -> Self {
        self.autoincrement = true;
        self.sequence = Some(sequence.into());
        self
    }

    /// Overrides the nullability implied by the field type.
    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Unsigned numeric column.
    #[must_use]
    pub const fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Column length.
    #[must_use]
    pub const fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Numeric scale.
    #[must_use]
    pub const fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }

    /// Overrides the storage type implied by the field type.
    #[must_use]
    pub const fn storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = Some(storage_type);
        self
    }

    /// Value inserted when the field holds `NULL`.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Written on insert, never on update.
    #[must_use]
    pub const fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Converts bound values to `target` before they reach the session.
    #[must_use]
    pub const fn conversion(mut self, target: StorageType) -> Self {
        self.conversion = Some(target);
        self
    }
}

/// Describes one persistent property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    name: String,
    field: &'static str,
    column: String,
    primary_key: bool,
    autoincrement: bool,
    sequence: Option<String>,
    nullable: bool,
    unsigned: bool,
    length: usize,
    decimals: usize,
    storage_type: StorageType,
    default_value: Option<String>,
    comment: Option<String>,
    readonly: bool,
    conversion: Option<StorageType>,
}

impl PropertyDescriptor {
    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the record field bound to the property.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        self.field
    }

    /// Storage column name.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Part of the primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Value generated by the database on insert.
    #[must_use]
    pub const fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    /// Sequence supplying the value on insert.
    #[must_use]
    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    /// Column admits `NULL`.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Unsigned numeric column.
    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    /// Column length, 0 when unspecified.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Numeric scale, 0 when unspecified.
    #[must_use]
    pub const fn decimals(&self) -> usize {
        self.decimals
    }

    /// Declared or implied storage type.
    #[must_use]
    pub const fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    /// Value inserted in place of `NULL`.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Column comment.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Excluded from updates.
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Conversion applied to bound values.
    #[must_use]
    pub const fn conversion(&self) -> Option<StorageType> {
        self.conversion
    }
}

/// A named group of properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    name: String,
    unique: bool,
    fields: Vec<String>,
}

impl IndexDescriptor {
    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique index.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Property names in index order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Immutable structural description of an entity type.
pub struct EntityDescriptor {
    entity_name: String,
    type_name: &'static str,
    view: bool,
    comment: Option<String>,
    primary_keys: Vec<String>,
    composite_key: bool,
    properties: Vec<PropertyDescriptor>,
    by_name: HashMap<String, usize>,
    by_field: HashMap<&'static str, usize>,
    autoincrement_keys: Vec<String>,
    readonly_properties: Vec<String>,
    indexes: Vec<IndexDescriptor>,
    sharding: Option<Arc<dyn ShardingRule>>,
}

impl EntityDescriptor {
    /// Builds the descriptor for `E` from its declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the declaration is malformed.
    pub fn build<E: Entity>() -> Result<Self> {
        Self::from_declaration(E::TYPE_NAME, &E::fields(), E::declaration())
    }

    fn from_declaration(
        type_name: &'static str, fields: &[FieldSpec], decl: Declaration,
    ) -> Result<Self> {
        let entity_name = match decl.name.as_deref().map(str::trim) {
            Some("") => return Err(crate::config_error!("blank entity name on '{}'", type_name)),
            Some(name) => name.to_string(),
            None => to_storage_name(type_name, 0),
        };

        let mut descriptor = Self {
            entity_name,
            type_name,
            view: decl.view,
            comment: decl.comment.clone(),
            primary_keys: Vec::new(),
            composite_key: false,
            properties: Vec::new(),
            by_name: HashMap::new(),
            by_field: HashMap::new(),
            autoincrement_keys: Vec::new(),
            readonly_properties: Vec::new(),
            indexes: Vec::new(),
            sharding: decl.sharding.clone(),
        };

        let key_field = if decl.view { None } else { decl.primary_key.as_deref() };
        if !decl.view {
            let Some(key) = key_field else {
                return Err(crate::config_error!("primary key not declared on '{}'", type_name));
            };
            if !fields.iter().any(|field| field.name == key) {
                return Err(crate::config_error!(
                    "primary key field '{}' not found on '{}'",
                    key,
                    type_name
                ));
            }
        }

        for field in fields {
            if decl.transient.iter().any(|name| name == field.name) {
                continue;
            }
            let is_key = key_field == Some(field.name);
            if field.members.is_empty() {
                descriptor.register(&decl, field.name, field, is_key);
                continue;
            }
            if !is_key {
                return Err(crate::config_error!(
                    "structured field '{}' on '{}' is only supported as the primary key",
                    field.name,
                    type_name
                ));
            }
            descriptor.composite_key = true;
            for &member in field.members {
                let spec = FieldSpec {
                    name: member,
                    members: &[],
                    nullable: false,
                    storage_type: StorageType::Unknown,
                };
                descriptor.register(&decl, member, &spec, true);
            }
        }

        if !decl.view && descriptor.primary_keys.is_empty() {
            return Err(crate::config_error!("primary key of '{}' maps to no property", type_name));
        }

        descriptor.parse_indexes(&decl)?;
        Ok(descriptor)
    }

    // Properties whose name collides with an already registered one are ignored.
    fn register(
        &mut self, decl: &Declaration, field: &'static str, spec: &FieldSpec, is_key: bool,
    ) {
        let property = decl.property_decl(field).cloned().unwrap_or_default();
        let column = property.column.unwrap_or_else(|| to_storage_name(field, 0));
        let name = property.name.unwrap_or_else(|| to_property_name(&column));
        if self.by_name.contains_key(&name) {
            tracing::debug!(
                entity = %self.entity_name,
                property = %name,
                field,
                "ignoring duplicate property"
            );
            return;
        }

        let descriptor = PropertyDescriptor {
            name: name.clone(),
            field,
            column,
            primary_key: is_key,
            autoincrement: property.autoincrement,
            sequence: property.sequence,
            nullable: property.nullable.unwrap_or(spec.nullable && !is_key),
            unsigned: property.unsigned,
            length: property.length,
            decimals: property.decimals,
            storage_type: property.storage_type.unwrap_or(spec.storage_type),
            default_value: property.default_value,
            comment: property.comment,
            readonly: property.readonly,
            conversion: property.conversion,
        };

        if is_key {
            self.primary_keys.push(name.clone());
            if descriptor.autoincrement {
                self.autoincrement_keys.push(name.clone());
            }
        }
        if descriptor.readonly {
            self.readonly_properties.push(name.clone());
        }

        self.by_name.insert(name, self.properties.len());
        self.by_field.insert(field, self.properties.len());
        self.properties.push(descriptor);
    }

    fn parse_indexes(&mut self, decl: &Declaration) -> Result<()> {
        if self.view {
            return Ok(());
        }
        for index in &decl.indexes {
            let name = index.name.trim();
            if name.is_empty() {
                return Err(crate::config_error!("blank index name on '{}'", self.type_name));
            }
            if self.indexes.iter().any(|existing| existing.name == name) {
                return Err(crate::config_error!(
                    "duplicate index '{}' on '{}'",
                    name,
                    self.type_name
                ));
            }
            if index.fields.is_empty() {
                return Err(crate::config_error!(
                    "index '{}' on '{}' has no fields",
                    name,
                    self.type_name
                ));
            }
            let fields = index
                .fields
                .iter()
                .map(|field| {
                    self.resolve(field).map(|property| property.name.clone()).ok_or_else(|| {
                        crate::config_error!("Invalid index field '{}' in index '{}'", field, name)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            self.indexes.push(IndexDescriptor {
                name: name.to_string(),
                unique: index.unique,
                fields,
            });
        }
        Ok(())
    }

    /// Logical entity (table) name.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Rust type name of the entity.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Read-only view.
    #[must_use]
    pub const fn is_view(&self) -> bool {
        self.view
    }

    /// Entity comment.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Primary key property names, in key order.
    #[must_use]
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// The key is a structured record flattened into the properties.
    #[must_use]
    pub const fn is_composite_key(&self) -> bool {
        self.composite_key
    }

    /// Properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Property names in declaration order.
    #[must_use]
    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(PropertyDescriptor::name).collect()
    }

    /// Property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_name.get(name).map(|&pos| &self.properties[pos])
    }

    /// Property bound to the record field `field`.
    #[must_use]
    pub fn property_by_field(&self, field: &str) -> Option<&PropertyDescriptor> {
        self.by_field.get(field).map(|&pos| &self.properties[pos])
    }

    /// Property named by a property name, field name or column name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.property(name)
            .or_else(|| self.property_by_field(name))
            .or_else(|| self.properties.iter().find(|property| property.column == name))
    }

    /// Whether `name` resolves to a property.
    #[must_use]
    pub fn contains_property(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Whether `name` resolves to a key property.
    #[must_use]
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(PropertyDescriptor::is_primary_key)
    }

    /// Whether `name` resolves to an autoincrement property.
    #[must_use]
    pub fn is_autoincrement(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(PropertyDescriptor::is_autoincrement)
    }

    /// Whether `name` resolves to a readonly property.
    #[must_use]
    pub fn is_readonly(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(PropertyDescriptor::is_readonly)
    }

    /// Autoincrement key property names.
    #[must_use]
    pub fn autoincrement_keys(&self) -> &[String] {
        &self.autoincrement_keys
    }

    /// Whether any key is generated on insert.
    #[must_use]
    pub fn has_autoincrement(&self) -> bool {
        !self.autoincrement_keys.is_empty()
    }

    /// The key filled from the database after an insert: the first autoincrement key.
    #[must_use]
    pub fn generated_key(&self) -> Option<&PropertyDescriptor> {
        self.autoincrement_keys.first().and_then(|key| self.property(key))
    }

    /// Readonly property names.
    #[must_use]
    pub fn readonly_properties(&self) -> &[String] {
        &self.readonly_properties
    }

    /// Indexes in declaration order.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    /// Index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Partition resolution strategy, if sharded.
    #[must_use]
    pub fn sharding_rule(&self) -> Option<&Arc<dyn ShardingRule>> {
        self.sharding.as_ref()
    }

    /// Rejects writes against views.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for views.
    pub fn ensure_writable(&self) -> Result<()> {
        if self.view {
            return Err(Error::Unsupported(format!("'{}' is a view", self.entity_name)));
        }
        Ok(())
    }

    /// Predicate matching one row by key: `k1 = ? AND k2 = ? ..` in key order,
    /// with key columns quoted for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] when the number of values differs from the
    /// number of key properties.
    pub fn key_cond(&self, dialect: &dyn Dialect, values: Vec<Value>) -> Result<Cond> {
        if values.is_empty() || values.len() != self.primary_keys.len() {
            return Err(crate::argument_error!(
                "'{}' has {} key properties but {} key values were given",
                self.entity_name,
                self.primary_keys.len(),
                values.len()
            ));
        }
        let mut cond = Cond::new();
        for (key, value) in self.primary_keys.iter().zip(values) {
            let column = self.property(key).map_or(key.as_str(), PropertyDescriptor::column);
            cond = cond.and_if_need().eq(&dialect.quote_identifier(column), value);
        }
        Ok(cond)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("entity_name", &self.entity_name)
            .field("primary_keys", &self.primary_keys)
            .field("composite_key", &self.composite_key)
            .field("properties", &self.property_names())
            .field("indexes", &self.indexes)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}
