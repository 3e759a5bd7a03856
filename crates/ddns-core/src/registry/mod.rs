//! Plugin-based record store registry
//!
//! The registry maps provider type names to factories, so the daemon builds
//! its record store from configuration without a hardcoded if-else chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let mut registry = ProviderRegistry::new();
//! ddns_core::store::register(&mut registry);
//! ddns_provider_cloudflare::register(&mut registry);
//!
//! let store = registry.create_store(&config.provider)?;
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{RecordStore, RecordStoreFactory};
use std::collections::HashMap;

/// Registry of record store factories keyed by provider type name
#[derive(Default)]
pub struct ProviderRegistry {
    stores: HashMap<String, Box<dyn RecordStoreFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record store factory
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register_store(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn RecordStoreFactory>,
    ) {
        self.stores.insert(name.into(), factory);
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_store(&self, config: &ProviderConfig) -> Result<Box<dyn RecordStore>> {
        let provider_type = config.type_name();

        let factory = self
            .stores
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types, sorted
    pub fn list_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStoreFactory;

    impl RecordStoreFactory for MockStoreFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn RecordStore>> {
            Err(Error::not_found("Mock store not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = ProviderRegistry::new();

        assert!(!registry.has_store("mock"));

        registry.register_store("mock", Box::new(MockStoreFactory));

        assert!(registry.has_store("mock"));
        assert_eq!(registry.list_stores(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_unknown_provider_type() {
        let registry = ProviderRegistry::new();
        let err = registry.create_store(&ProviderConfig::Memory).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_memory_store_registration() {
        let mut registry = ProviderRegistry::new();
        crate::store::register(&mut registry);

        let store = registry.create_store(&ProviderConfig::Memory).unwrap();
        assert_eq!(store.provider_name(), "memory");
    }
}
