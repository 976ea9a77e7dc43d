//! Process-wide entity descriptor cache.

use std::any::TypeId;
use std::sync::{Arc, LazyLock};

use moka::sync::Cache;

use crate::descriptor::EntityDescriptor;
use crate::entity::Entity;
use crate::error::{Error, Result};

// Built lazily, once per type. `try_get_with` serialises concurrent first
// requests for the same key while other keys build in parallel.
static DESCRIPTORS: LazyLock<Cache<TypeId, Arc<EntityDescriptor>>> =
    LazyLock::new(|| Cache::builder().build());

/// Returns the descriptor for `E`, building it on first use.
///
/// Concurrent first requests for the same type run one build and all observe
/// the same descriptor. A failed build is not cached; later calls fail again.
///
/// # Errors
///
/// Returns [`Error::Config`] if the entity declaration is malformed.
pub fn describe<E: Entity>() -> Result<Arc<EntityDescriptor>> {
    DESCRIPTORS
        .try_get_with(TypeId::of::<E>(), || {
            let descriptor = EntityDescriptor::build::<E>()?;
            tracing::debug!(
                entity = %descriptor.entity_name(),
                type_name = E::TYPE_NAME,
                properties = descriptor.properties().len(),
                "described entity"
            );
            Ok::<_, Error>(Arc::new(descriptor))
        })
        .map_err(|err| match err.as_ref() {
            Error::Config(msg) => Error::Config(msg.clone()),
            other => Error::Config(other.to_string()),
        })
}

/// Entity names of every type described so far.
#[must_use]
pub fn registered() -> Vec<String> {
    DESCRIPTORS.iter().map(|(_, descriptor)| descriptor.entity_name().to_string()).collect()
}
