use crate::di::{Injectable, Injector};
use crate::error::{Result, TrellisError};
use crate::metadata::{MetadataRegistry, Scope, TypeKey};
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A constructed, type-erased provider instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&mut Injector<'_>) -> Result<Instance> + Send + Sync>;

/// A providable type together with the recipe that constructs it.
#[derive(Clone)]
pub struct Provider {
    key: TypeKey,
    factory: Factory,
}

impl Provider {
    /// Provider constructed through [`Injectable::inject`].
    pub fn of<T: Injectable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            factory: Arc::new(|injector: &mut Injector<'_>| -> Result<Instance> {
                Ok(Arc::new(T::inject(injector)?))
            }),
        }
    }

    /// Provider for an instance that already exists.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        let instance: Instance = Arc::new(value);
        Self {
            key: TypeKey::of::<T>(),
            factory: Arc::new(move |_: &mut Injector<'_>| -> Result<Instance> {
                Ok(Arc::clone(&instance))
            }),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider({:?})", self.key)
    }
}

/// Per-module dependency injection container.
///
/// Holds the providers registered by one module and the singletons already
/// constructed from them. Both maps are concurrent so that resolution can
/// take `&self` while requests share the container.
pub struct Container {
    module: TypeKey,
    registry: Arc<MetadataRegistry>,
    providers: DashMap<TypeKey, Provider>,
    instances: DashMap<TypeKey, Instance>,
}

impl Container {
    pub fn new(module: TypeKey, registry: Arc<MetadataRegistry>) -> Self {
        Self {
            module,
            registry,
            providers: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Module this container belongs to.
    pub fn module(&self) -> TypeKey {
        self.module
    }

    /// Register a provider. Registering the same type twice keeps the first.
    pub fn add_provider(&self, provider: Provider) -> &Self {
        self.providers.entry(provider.key).or_insert(provider);
        self
    }

    pub fn has(&self, key: TypeKey) -> bool {
        self.providers.contains_key(&key)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.has(TypeKey::of::<T>())
    }

    /// Resolve `T` using only this container.
    ///
    /// Dependencies that are not registered here are constructed implicitly
    /// in this container; use [`ModuleGraph`](crate::module::ModuleGraph) to
    /// resolve across modules.
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        Injector::new(self, None).get::<T>()
    }

    /// Construct (or fetch the cached singleton of) a registered provider.
    pub(crate) fn instantiate(&self, key: TypeKey, injector: &mut Injector<'_>) -> Result<Instance> {
        if let Some(instance) = self.instances.get(&key) {
            return Ok(Arc::clone(instance.value()));
        }

        // Clone the provider out so no map guard is held while its
        // dependencies resolve through this same container.
        let provider = self
            .providers
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TrellisError::not_found(key.name()))?;

        let instance = (provider.factory)(injector)?;
        match self.registry.scope(key) {
            Scope::Singleton => {
                let cached = self.instances.entry(key).or_insert(instance);
                tracing::debug!(provider = ?key, module = ?self.module, "Singleton constructed");
                Ok(Arc::clone(cached.value()))
            }
            Scope::Transient => Ok(instance),
        }
    }

    pub fn provider_keys(&self) -> Vec<TypeKey> {
        self.providers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Drop every cached singleton.
    pub(crate) fn clear_instances(&self) {
        self.instances.clear();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("module", &self.module)
            .field("providers", &self.providers.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}
