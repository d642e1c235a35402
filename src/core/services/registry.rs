use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::core::errors::{EncryptionError, Result};
use crate::core::models::addr::PluginKind;
use crate::core::traits::key_provider::KeyProviderDescriptor;
use crate::core::traits::method::MethodDescriptor;

#[derive(Default)]
struct Catalog {
    key_providers: HashMap<String, Arc<dyn KeyProviderDescriptor>>,
    methods: HashMap<String, Arc<dyn MethodDescriptor>>,
}

/// Thread-safe catalog of key provider and method descriptors.
///
/// One registry is built at process start and shared by reference with
/// everything that resolves configured types. Lookups run concurrently;
/// a registration excludes them for the duration of a single insert.
#[derive(Default)]
pub struct Registry {
    catalog: RwLock<Catalog>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key provider type. Fails if the type name is taken.
    pub fn register_key_provider(&self, descriptor: Arc<dyn KeyProviderDescriptor>) -> Result<()> {
        let type_name = descriptor.type_name().to_string();
        let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        if catalog.key_providers.contains_key(&type_name) {
            return Err(EncryptionError::DuplicateRegistration {
                kind: PluginKind::KeyProvider,
                type_name,
            });
        }
        debug!(type_name = %type_name, "registered key provider");
        catalog.key_providers.insert(type_name, descriptor);
        Ok(())
    }

    /// Register a method type. Fails if the type name is taken.
    pub fn register_method(&self, descriptor: Arc<dyn MethodDescriptor>) -> Result<()> {
        let type_name = descriptor.type_name().to_string();
        let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        if catalog.methods.contains_key(&type_name) {
            return Err(EncryptionError::DuplicateRegistration {
                kind: PluginKind::Method,
                type_name,
            });
        }
        debug!(type_name = %type_name, "registered method");
        catalog.methods.insert(type_name, descriptor);
        Ok(())
    }

    pub fn key_provider_by_name(&self, type_name: &str) -> Result<Arc<dyn KeyProviderDescriptor>> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .key_providers
            .get(type_name)
            .cloned()
            .ok_or_else(|| EncryptionError::UnknownType {
                kind: PluginKind::KeyProvider,
                type_name: type_name.to_string(),
            })
    }

    pub fn method_by_name(&self, type_name: &str) -> Result<Arc<dyn MethodDescriptor>> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .methods
            .get(type_name)
            .cloned()
            .ok_or_else(|| EncryptionError::UnknownType {
                kind: PluginKind::Method,
                type_name: type_name.to_string(),
            })
    }

    /// Registered type names of the given kind, sorted.
    pub fn type_names(&self, kind: PluginKind) -> Vec<String> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = match kind {
            PluginKind::KeyProvider => catalog.key_providers.keys().cloned().collect(),
            PluginKind::Method => catalog.methods.keys().cloned().collect(),
        };
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::core::models::key_output::KeyOutput;
    use crate::core::traits::key_provider::KeyProvider;
    use crate::core::traits::method::MethodInstance;

    struct FakeProvider(&'static str, u8);

    impl KeyProviderDescriptor for FakeProvider {
        fn type_name(&self) -> &str {
            self.0
        }

        fn build(&self, _body: &toml::Table) -> Result<Box<dyn KeyProvider>> {
            Ok(Box::new(FixedKey(self.1)))
        }
    }

    struct FixedKey(u8);

    impl KeyProvider for FixedKey {
        fn provide(&self, _meta: Option<&[u8]>) -> Result<(KeyOutput, Option<Vec<u8>>)> {
            Ok((KeyOutput::new(vec![self.0; 32], Some(vec![self.0; 32])), None))
        }
    }

    struct FakeMethod(&'static str);

    impl MethodDescriptor for FakeMethod {
        fn type_name(&self) -> &str {
            self.0
        }

        fn build(&self, _body: &toml::Table, _keys: Vec<KeyOutput>) -> Result<MethodInstance> {
            Ok(MethodInstance::Unencrypted)
        }
    }

    fn provided_key(registry: &Registry, type_name: &str) -> Vec<u8> {
        let provider = registry
            .key_provider_by_name(type_name)
            .unwrap()
            .build(&toml::Table::new())
            .unwrap();
        provider.provide(None).unwrap().0.encryption_key.clone()
    }

    #[test]
    fn register_and_lookup() {
        let registry = Registry::new();
        registry.register_key_provider(Arc::new(FakeProvider("fake", 1))).unwrap();
        registry.register_method(Arc::new(FakeMethod("noop"))).unwrap();

        assert_eq!(registry.key_provider_by_name("fake").unwrap().type_name(), "fake");
        assert_eq!(registry.method_by_name("noop").unwrap().type_name(), "noop");
        assert_eq!(registry.type_names(PluginKind::KeyProvider), vec!["fake"]);
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        let registry = Registry::new();
        registry.register_key_provider(Arc::new(FakeProvider("fake", 1))).unwrap();

        let err = registry
            .register_key_provider(Arc::new(FakeProvider("fake", 2)))
            .unwrap_err();
        assert!(matches!(
            err,
            EncryptionError::DuplicateRegistration { kind: PluginKind::KeyProvider, .. }
        ));

        assert_eq!(provided_key(&registry, "fake"), vec![1; 32]);
    }

    #[test]
    fn same_name_in_different_kinds_is_allowed() {
        let registry = Registry::new();
        registry.register_key_provider(Arc::new(FakeProvider("shared", 1))).unwrap();
        registry.register_method(Arc::new(FakeMethod("shared"))).unwrap();
        assert!(registry.register_method(Arc::new(FakeMethod("shared"))).is_err());
    }

    #[test]
    fn unknown_type_is_reported_with_kind() {
        let registry = Registry::new();
        let err = registry.method_by_name("rot13").err().unwrap();
        assert!(matches!(err, EncryptionError::UnknownType { kind: PluginKind::Method, .. }));
        assert!(err.to_string().contains("rot13"));
    }

    #[test]
    fn concurrent_duplicate_registration_has_one_winner() {
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry
                        .register_key_provider(Arc::new(FakeProvider("contended", i)))
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);

        let key = provided_key(&registry, "contended");
        assert!(key.iter().all(|b| *b == key[0]));
    }
}
