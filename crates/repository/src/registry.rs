//! Explicit repository registration.
//!
//! Applications list their repository bindings at startup: one
//! `register::<Entity, Id>(metadata)` call per declared repository. No
//! filesystem or package scanning is involved. Each binding derives (or
//! reuses) the entity's descriptor and publishes one shared repository
//! instance over the common client handle.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use elasticsearch::Elasticsearch;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::{ClientConfig, build_client};
use crate::descriptor::{DescriptorCache, EntityMetadata};
use crate::error::ConfigError;
use crate::repository::ElasticsearchRepository;

/// Startup-time registry of entity-bound repositories.
///
/// Shared resources: the client handle (read-only, concurrency-safe) and
/// the descriptor cache. Both are safe for concurrent use by multiple
/// registering threads; concurrent registration of the same binding yields
/// one shared winner.
pub struct RepositoryRegistry {
    client: Arc<Elasticsearch>,
    descriptors: DescriptorCache,
    entries: RwLock<HashMap<(TypeId, TypeId), Arc<dyn Any + Send + Sync>>>,
}

impl RepositoryRegistry {
    /// Creates a registry over an existing client handle.
    pub fn new(client: Arc<Elasticsearch>) -> Self {
        Self {
            client,
            descriptors: DescriptorCache::new(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Builds the client from configuration and wraps it in a registry.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(build_client(config)?)))
    }

    /// The shared client handle.
    pub fn client(&self) -> &Arc<Elasticsearch> {
        &self.client
    }

    /// Registers one `(entity, id)` binding and returns its repository.
    ///
    /// Descriptor derivation happens here: mis-declared metadata aborts
    /// registration with a [`ConfigError`] and no repository is produced.
    /// Registering an already-registered binding returns the existing
    /// instance.
    pub fn register<T, Id>(
        &self,
        metadata: &EntityMetadata,
    ) -> Result<Arc<ElasticsearchRepository<T, Id>>, ConfigError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        Id: Display + Send + Sync + 'static,
    {
        let key = (TypeId::of::<T>(), TypeId::of::<Id>());

        if let Some(existing) = self.lookup::<T, Id>(&key) {
            return Ok(existing);
        }

        let descriptor = self.descriptors.describe::<T>(metadata)?;
        let repository = Arc::new(ElasticsearchRepository::with_descriptor(
            self.client.clone(),
            descriptor,
        ));

        let mut entries = self.entries.write();
        if let Some(winner) = entries
            .get(&key)
            .and_then(|e| e.clone().downcast::<ElasticsearchRepository<T, Id>>().ok())
        {
            return Ok(winner);
        }
        entries.insert(key, repository.clone());

        tracing::info!(
            "Registered repository for entity '{}' on index '{}'",
            metadata.type_name,
            repository.index_name()
        );
        Ok(repository)
    }

    /// Returns the repository for a previously registered binding.
    pub fn get<T, Id>(&self) -> Option<Arc<ElasticsearchRepository<T, Id>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        Id: Display + Send + Sync + 'static,
    {
        self.lookup::<T, Id>(&(TypeId::of::<T>(), TypeId::of::<Id>()))
    }

    fn lookup<T, Id>(
        &self,
        key: &(TypeId, TypeId),
    ) -> Option<Arc<ElasticsearchRepository<T, Id>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        Id: Display + Send + Sync + 'static,
    {
        self.entries
            .read()
            .get(key)
            .and_then(|e| e.clone().downcast::<ElasticsearchRepository<T, Id>>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldMetadata;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct BlogPost {
        id: Option<u64>,
        title: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Account {
        id: Option<String>,
        name: String,
    }

    const BLOG_POST_METADATA: EntityMetadata = EntityMetadata {
        type_name: "BlogPost",
        index: None,
        fields: &[FieldMetadata::id("id"), FieldMetadata::new("title")],
    };

    fn registry() -> RepositoryRegistry {
        RepositoryRegistry::from_config(&ClientConfig::default()).unwrap()
    }

    #[test]
    fn test_register_returns_shared_instance() {
        let registry = registry();
        let a = registry
            .register::<BlogPost, u64>(&BLOG_POST_METADATA)
            .unwrap();
        let b = registry
            .register::<BlogPost, u64>(&BLOG_POST_METADATA)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.index_name(), "blogPost");
    }

    #[test]
    fn test_get_before_register_is_none() {
        let registry = registry();
        assert!(registry.get::<BlogPost, u64>().is_none());
        registry
            .register::<BlogPost, u64>(&BLOG_POST_METADATA)
            .unwrap();
        assert!(registry.get::<BlogPost, u64>().is_some());
    }

    #[test]
    fn test_misdeclared_binding_registers_nothing() {
        let registry = registry();
        let metadata = EntityMetadata {
            type_name: "Account",
            index: None,
            fields: const { &[FieldMetadata::new("name")] },
        };
        let result = registry.register::<Account, String>(&metadata);
        assert!(matches!(result, Err(ConfigError::MissingIdField { .. })));
        assert!(registry.get::<Account, String>().is_none());
    }

    #[test]
    fn test_bindings_are_keyed_by_entity_and_id_type() {
        let registry = registry();
        registry
            .register::<BlogPost, u64>(&BLOG_POST_METADATA)
            .unwrap();

        let account_metadata = EntityMetadata {
            type_name: "Account",
            index: Some("accounts"),
            fields: const { &[FieldMetadata::id("id"), FieldMetadata::new("name")] },
        };
        let account = registry
            .register::<Account, String>(&account_metadata)
            .unwrap();
        assert_eq!(account.index_name(), "accounts");
        assert!(registry.get::<BlogPost, u64>().is_some());
    }
}
