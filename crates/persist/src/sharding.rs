//! Partition resolution for sharded entities.

use std::fmt::Debug;

use sea_query::Value;

use crate::convert::{to_text, value_to_data_type};

/// Caller-supplied value used to pick a physical partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardContext {
    param: Value,
}

impl ShardContext {
    /// Wraps the sharding parameter.
    pub fn new(param: impl Into<Value>) -> Self {
        Self { param: param.into() }
    }

    /// The sharding parameter.
    #[must_use]
    pub const fn param(&self) -> &Value {
        &self.param
    }

    /// Textual form of the parameter, empty when it has none.
    #[must_use]
    pub fn param_text(&self) -> String {
        value_to_data_type(self.param.clone())
            .ok()
            .and_then(|value| to_text(&value))
            .unwrap_or_default()
    }
}

/// Maps an entity name and sharding parameter to a physical table name.
pub trait ShardingRule: Send + Sync + Debug {
    /// Physical table name (without prefix) for `entity_name` and `context`.
    fn shard_name(&self, entity_name: &str, context: &ShardContext) -> String;
}

/// Appends the parameter's text to the entity name: `orders` + `2024` gives
/// `orders_2024`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixSharding;

impl ShardingRule for SuffixSharding {
    fn shard_name(&self, entity_name: &str, context: &ShardContext) -> String {
        let suffix = context.param_text();
        if suffix.is_empty() { entity_name.to_string() } else { format!("{entity_name}_{suffix}") }
    }
}

/// Spreads rows over a fixed number of tables: `orders_0` .. `orders_{n-1}`.
///
/// Integer parameters select the Euclidean remainder `param mod shards`, so
/// negative values land in range too. Other parameters are hashed with FNV-1a
/// 64, which gives the same slot on every platform and release.
#[derive(Debug, Clone, Copy)]
pub struct ModuloSharding {
    shards: u64,
}

impl ModuloSharding {
    /// Rule over `shards` tables. A count of zero is treated as one.
    #[must_use]
    pub const fn new(shards: u64) -> Self {
        Self {
            shards: if shards == 0 { 1 } else { shards },
        }
    }
}

impl ShardingRule for ModuloSharding {
    fn shard_name(&self, entity_name: &str, context: &ShardContext) -> String {
        let text = context.param_text();
        let slot = if let Ok(number) = text.parse::<u64>() {
            number % self.shards
        } else if let Ok(number) = text.parse::<i64>() {
            number.rem_euclid(i64::try_from(self.shards).unwrap_or(i64::MAX)).unsigned_abs()
        } else {
            fnv1a_64(text.as_bytes()) % self.shards
        };
        format!("{entity_name}_{slot}")
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

// FNV-1a, 64-bit.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}
