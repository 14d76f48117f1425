//! Entity descriptors derived from declarative metadata.
//!
//! Applications describe each entity type once at registration time with an
//! [`EntityMetadata`] value: the type's simple name, an optional explicit
//! index name, and its declared fields with exactly one marked as the
//! identifier. No runtime type introspection is involved; the descriptor is
//! a pure function of the metadata.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ConfigError;

/// One declared field of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Field name as it appears in the serialized document.
    pub name: &'static str,
    /// Whether this field is the document identifier.
    pub id: bool,
}

impl FieldMetadata {
    /// A plain (non-identifier) field.
    pub const fn new(name: &'static str) -> Self {
        Self { name, id: false }
    }

    /// The identifier field. Exactly one per entity type.
    pub const fn id(name: &'static str) -> Self {
        Self { name, id: true }
    }
}

/// Declarative metadata for one entity type.
///
/// Only two outputs of the metadata source matter to the repository: the
/// optional index-name override and the identifier field. The field list
/// stands in for the entity type's declared fields.
#[derive(Debug, Clone, Copy)]
pub struct EntityMetadata {
    /// Simple type name, e.g. `"BlogPost"`. Used to derive the index name
    /// when no explicit override is given.
    pub type_name: &'static str,
    /// Explicit index name. Used verbatim when present.
    pub index: Option<&'static str>,
    /// Declared fields in declaration order.
    pub fields: &'static [FieldMetadata],
}

/// Derived, immutable per-entity-type metadata.
///
/// Built once per entity type and never mutated afterwards; safe for
/// unsynchronized concurrent reads.
#[derive(Debug)]
pub struct EntityDescriptor<T> {
    index_name: String,
    id_field: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: 'static> EntityDescriptor<T> {
    /// Derives a descriptor from declarative metadata.
    ///
    /// Fails with a [`ConfigError`] when zero or more than one field is
    /// marked as the identifier. Never silently defaults.
    pub fn describe(metadata: &EntityMetadata) -> Result<Self, ConfigError> {
        let id_fields: Vec<&str> = metadata
            .fields
            .iter()
            .filter(|f| f.id)
            .map(|f| f.name)
            .collect();

        let id_field = match id_fields.as_slice() {
            [single] => (*single).to_string(),
            [] => {
                return Err(ConfigError::MissingIdField {
                    type_name: metadata.type_name.to_string(),
                });
            }
            many => {
                return Err(ConfigError::AmbiguousIdField {
                    type_name: metadata.type_name.to_string(),
                    fields: many.iter().map(|f| f.to_string()).collect(),
                });
            }
        };

        Ok(Self {
            index_name: resolve_index_name(metadata),
            id_field,
            _entity: PhantomData,
        })
    }

    /// The index holding documents of this entity type.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Name of the identifier field in the serialized document.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }
}

/// Resolves the index name: explicit metadata verbatim, otherwise the type's
/// simple name with its first character lower-cased.
fn resolve_index_name(metadata: &EntityMetadata) -> String {
    match metadata.index {
        Some(explicit) => explicit.to_string(),
        None => lowercase_first(metadata.type_name),
    }
}

fn lowercase_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Process-lifetime cache of descriptors, one per entity type.
///
/// Concurrent first use from multiple callers is guarded: exactly one
/// descriptor instance wins and is shared. Construction failures are not
/// cached, so a corrected registration can succeed later.
#[derive(Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("len", &self.entries.read().len())
            .finish()
    }
}

impl DescriptorCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor for `T`, deriving it from `metadata`
    /// on first use.
    pub fn describe<T: 'static>(
        &self,
        metadata: &EntityMetadata,
    ) -> Result<Arc<EntityDescriptor<T>>, ConfigError> {
        let key = TypeId::of::<T>();

        if let Some(existing) = self.lookup::<T>(key) {
            return Ok(existing);
        }

        let descriptor = Arc::new(EntityDescriptor::<T>::describe(metadata)?);

        let mut entries = self.entries.write();
        if let Some(winner) = entries
            .get(&key)
            .and_then(|e| e.clone().downcast::<EntityDescriptor<T>>().ok())
        {
            // Lost a first-construction race; share the winner.
            return Ok(winner);
        }
        entries.insert(key, descriptor.clone());
        Ok(descriptor)
    }

    /// Returns the cached descriptor for `T`, if one has been derived.
    pub fn get<T: 'static>(&self) -> Option<Arc<EntityDescriptor<T>>> {
        self.lookup::<T>(TypeId::of::<T>())
    }

    fn lookup<T: 'static>(&self, key: TypeId) -> Option<Arc<EntityDescriptor<T>>> {
        self.entries
            .read()
            .get(&key)
            .and_then(|e| e.clone().downcast::<EntityDescriptor<T>>().ok())
    }
}
