//! A process-wide catalogue of [`ObjectType`]s, with an abstract plugin
//! ("type provider") loading mechanism for names that are not directly
//! registered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::instrument;

use super::ObjectType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("provider {0:?} could not be loaded")]
    ProviderLoadFailed(String),
    #[error("{0:?} is neither a registered type nor a known provider")]
    UnknownProviderOrType(String),
}

/// Supplies sets of [`ObjectType`]s on demand, identified by a provider id.
/// The abstract stand-in for the source system's dynamic plugin loading.
pub trait TypeProvider: Send + Sync {
    fn load(&self, provider_id: &str) -> Result<Vec<ObjectType>, Error>;
}

/// Thread-safe catalogue mapping type names to constructors, with a second
/// cache keyed by the provider identifier that produced them.
pub struct TypeRegistry {
    by_name: Mutex<HashMap<String, Arc<ObjectType>>>,
    by_provider: Mutex<HashMap<String, Vec<Arc<ObjectType>>>>,
    provider: Mutex<Option<Arc<dyn TypeProvider>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            by_name: Mutex::new(HashMap::new()),
            by_provider: Mutex::new(HashMap::new()),
            provider: Mutex::new(None),
        }
    }

    /// The process-wide singleton registry. Treated as a designated
    /// singleton with explicit, lazy init rather than an implicit global
    /// constructor; trees that want an isolated registry can build their
    /// own via [`TypeRegistry::new`] instead of using this one.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);
        &GLOBAL
    }

    pub fn set_provider(&self, provider: Arc<dyn TypeProvider>) {
        *self.provider.lock().unwrap() = Some(provider);
    }

    pub fn register(&self, object_type: ObjectType) -> Arc<ObjectType> {
        let object_type = Arc::new(object_type);
        self.by_name
            .lock()
            .unwrap()
            .insert(object_type.name().to_owned(), object_type.clone());
        object_type
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.by_name.lock().unwrap().contains_key(name)
    }

    pub fn all_names(&self) -> Vec<String> {
        self.by_name.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ObjectType>> {
        self.by_name.lock().unwrap().get(name).cloned()
    }

    /// Resolves each name to an [`ObjectType`]. A name matching an already
    /// registered type is used directly; otherwise it is treated as a type
    /// provider identifier: the provider is invoked to materialise a set of
    /// types, which are cached under that identifier and merged into the
    /// name table.
    #[instrument(skip(self))]
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<ObjectType>>, Error> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if let Some(existing) = self.get(name) {
                resolved.push(existing);
                continue;
            }
            if let Some(cached) = self.by_provider.lock().unwrap().get(name) {
                resolved.extend(cached.iter().cloned());
                continue;
            }
            let provider = self.provider.lock().unwrap().clone();
            let Some(provider) = provider else {
                return Err(Error::UnknownProviderOrType(name.clone()));
            };
            let loaded = provider
                .load(name)
                .map_err(|_| Error::ProviderLoadFailed(name.clone()))?;
            let loaded: Vec<Arc<ObjectType>> = loaded.into_iter().map(Arc::new).collect();
            {
                let mut by_name = self.by_name.lock().unwrap();
                for t in &loaded {
                    by_name.insert(t.name().to_owned(), t.clone());
                }
            }
            self.by_provider
                .lock()
                .unwrap()
                .insert(name.clone(), loaded.clone());
            resolved.extend(loaded);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectTypeBuilder;
    use std::any::Any;
    use std::sync::Arc as StdArc;

    struct Noop;
    impl super::super::TypedObject for Noop {
        fn as_any_arc(self: StdArc<Self>) -> StdArc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn register_then_resolve_by_name() {
        let registry = TypeRegistry::new();
        let ty = ObjectTypeBuilder::<Noop>::new("Noop").build(|_| Noop);
        registry.register(ty);

        assert!(registry.is_registered("Noop"));
        let resolved = registry.resolve(&["Noop".to_string()]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "Noop");
    }

    #[test]
    fn unknown_name_without_provider_errors() {
        let registry = TypeRegistry::new();
        let err = registry.resolve(&["Missing".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnknownProviderOrType(_)));
    }

    struct StaticProvider;
    impl TypeProvider for StaticProvider {
        fn load(&self, provider_id: &str) -> Result<Vec<ObjectType>, Error> {
            Ok(vec![ObjectTypeBuilder::<Noop>::new(format!("{provider_id}.Widget")).build(|_| Noop)])
        }
    }

    #[test]
    fn unregistered_name_falls_back_to_provider_and_caches() {
        let registry = TypeRegistry::new();
        registry.set_provider(Arc::new(StaticProvider));

        let resolved = registry.resolve(&["plugins/ui".to_string()]).unwrap();
        assert_eq!(resolved[0].name(), "plugins/ui.Widget");
        assert!(registry.is_registered("plugins/ui.Widget"));

        // Second resolve must hit the provider cache, not reinvoke the provider.
        let resolved_again = registry.resolve(&["plugins/ui".to_string()]).unwrap();
        assert_eq!(resolved_again.len(), 1);
    }
}
