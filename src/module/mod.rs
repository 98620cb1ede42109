//! Module Graph
//!
//! Walks the import graph from the root module, giving every module its own
//! [`Container`]. Imports are scanned depth-first before the importing
//! module registers its own providers, and each module is scanned once.
//!
//! Cross-module lookup deliberately favours finding a provider over
//! encapsulation: a module's `exports` list is not enforced.

use crate::di::{Container, Injectable, Injector, Instance};
use crate::error::{Result, TrellisError};
use crate::metadata::{MetadataRegistry, TypeKey};
use std::collections::HashMap;
use std::sync::Arc;

/// A controller type and the module that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerEntry {
    pub controller: TypeKey,
    pub module: TypeKey,
}

pub struct ModuleGraph {
    registry: Arc<MetadataRegistry>,
    containers: HashMap<TypeKey, Arc<Container>>,
    order: Vec<TypeKey>,
    controllers: Vec<ControllerEntry>,
    scanning: Vec<TypeKey>,
    root: Option<TypeKey>,
}

impl ModuleGraph {
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self {
            registry,
            containers: HashMap::new(),
            order: Vec::new(),
            controllers: Vec::new(),
            scanning: Vec::new(),
            root: None,
        }
    }

    pub fn scan<M: 'static>(&mut self) -> Result<Arc<Container>> {
        self.scan_module(TypeKey::of::<M>())
    }

    /// Scan `module` and its imports, returning the module's container.
    ///
    /// # Errors
    /// Fails when a module in the graph has no module metadata or when the
    /// imports form a cycle.
    pub fn scan_module(&mut self, module: TypeKey) -> Result<Arc<Container>> {
        if let Some(container) = self.containers.get(&module) {
            return Ok(Arc::clone(container));
        }
        if let Some(start) = self.scanning.iter().position(|entry| *entry == module) {
            let cycle = self.scanning[start..]
                .iter()
                .chain(std::iter::once(&module))
                .map(|entry| entry.short_name())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(TrellisError::CircularImport { cycle });
        }

        let registry = Arc::clone(&self.registry);
        let metadata = registry
            .module_metadata(module)
            .ok_or_else(|| TrellisError::missing(module.name(), "module"))?;

        if self.scanning.is_empty() && self.root.is_none() {
            self.root = Some(module);
        }

        self.scanning.push(module);
        let imported = metadata
            .imports
            .iter()
            .try_for_each(|import| self.scan_module(*import).map(|_| ()));
        self.scanning.pop();
        imported?;

        let container = Container::new(module, Arc::clone(&registry));
        for provider in &metadata.providers {
            container.add_provider(provider.clone());
        }
        for controller in &metadata.controllers {
            container.add_provider(controller.clone());
            self.controllers.push(ControllerEntry {
                controller: controller.key(),
                module,
            });
        }

        tracing::info!(
            module = ?module,
            imports = metadata.imports.len(),
            providers = metadata.providers.len(),
            controllers = metadata.controllers.len(),
            "Module scanned"
        );

        let container = Arc::new(container);
        self.containers.insert(module, Arc::clone(&container));
        self.order.push(module);
        Ok(container)
    }

    /// Every declared controller, in module scan order then declaration order.
    pub fn controllers(&self) -> &[ControllerEntry] {
        &self.controllers
    }

    /// First module handed to [`scan_module`](Self::scan_module).
    pub fn root(&self) -> Option<TypeKey> {
        self.root
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn container(&self, module: TypeKey) -> Option<&Arc<Container>> {
        self.containers.get(&module)
    }

    /// Containers in scan order, imports before importers.
    pub fn containers(&self) -> impl Iterator<Item = &Arc<Container>> {
        self.order
            .iter()
            .filter_map(|module| self.containers.get(module))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// First container, in scan order, that registers `key`.
    pub fn container_of(&self, key: TypeKey) -> Option<&Container> {
        self.containers()
            .find(|container| container.has(key))
            .map(AsRef::as_ref)
    }

    /// Resolve a registered provider, preferring the `from` module's container.
    ///
    /// # Errors
    /// [`TrellisError::ProviderNotFound`] when no scanned module registers `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self, from: Option<TypeKey>) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.resolve_key(key, from)?
            .downcast::<T>()
            .map_err(|_| TrellisError::DowncastFailed {
                type_name: key.name().to_string(),
            })
    }

    pub(crate) fn resolve_key(&self, key: TypeKey, from: Option<TypeKey>) -> Result<Instance> {
        let hinted = from
            .and_then(|module| self.containers.get(&module))
            .map(AsRef::as_ref)
            .filter(|container: &&Container| container.has(key));
        let container = hinted
            .or_else(|| self.container_of(key))
            .ok_or_else(|| TrellisError::not_found(key.name()))?;
        Injector::new(container, Some(self)).resolve_key(key)
    }

    /// Resolve `T` on behalf of `module`, constructing it there when no
    /// module registers it.
    pub fn get<T: Injectable>(&self, module: TypeKey) -> Result<Arc<T>> {
        let container = self
            .containers
            .get(&module)
            .ok_or_else(|| TrellisError::missing(module.name(), "scanned module"))?;
        Injector::new(container, Some(self)).get::<T>()
    }

    /// Release every cached singleton held by the module containers.
    pub fn dispose(&self) {
        for container in self.containers() {
            container.clear_instances();
        }
        tracing::debug!(modules = self.order.len(), "Module containers disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ModuleMetadata;

    struct RootModule;
    struct SharedModule;
    struct FeatureModule;
    struct LoopA;
    struct LoopB;
    struct Unknown;

    struct SharedService;

    impl Injectable for SharedService {
        fn inject(_: &mut Injector<'_>) -> Result<Self> {
            Ok(SharedService)
        }
    }

    struct FeatureService {
        shared: Arc<SharedService>,
    }

    impl Injectable for FeatureService {
        fn inject(injector: &mut Injector<'_>) -> Result<Self> {
            Ok(FeatureService {
                shared: injector.get::<SharedService>()?,
            })
        }
    }

    struct RootController;

    impl Injectable for RootController {
        fn inject(_: &mut Injector<'_>) -> Result<Self> {
            Ok(RootController)
        }
    }

    struct FeatureController;

    impl Injectable for FeatureController {
        fn inject(_: &mut Injector<'_>) -> Result<Self> {
            Ok(FeatureController)
        }
    }

    fn registry() -> Arc<MetadataRegistry> {
        let mut registry = MetadataRegistry::new();
        registry
            .module::<SharedModule>(
                ModuleMetadata::new()
                    .provider::<SharedService>()
                    .export::<SharedService>(),
            )
            .module::<FeatureModule>(
                ModuleMetadata::new()
                    .import::<SharedModule>()
                    .controller::<FeatureController>()
                    .provider::<FeatureService>(),
            )
            .module::<RootModule>(
                ModuleMetadata::new()
                    .import::<FeatureModule>()
                    .import::<SharedModule>()
                    .controller::<RootController>(),
            )
            .module::<LoopA>(ModuleMetadata::new().import::<LoopB>())
            .module::<LoopB>(ModuleMetadata::new().import::<LoopA>());
        Arc::new(registry)
    }

    #[test]
    fn test_scan_is_memoized() {
        let mut graph = ModuleGraph::new(registry());
        let first = graph.scan::<RootModule>().unwrap();
        let count = graph.len();
        let second = graph.scan::<RootModule>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(graph.len(), count);
        assert_eq!(count, 3);
        assert_eq!(graph.controllers().len(), 2);
        assert_eq!(graph.root(), Some(TypeKey::of::<RootModule>()));
    }

    #[test]
    fn test_imports_scanned_before_importer() {
        let mut graph = ModuleGraph::new(registry());
        graph.scan::<RootModule>().unwrap();

        let order: Vec<_> = graph.containers().map(|c| c.module()).collect();
        assert_eq!(
            order,
            vec![
                TypeKey::of::<SharedModule>(),
                TypeKey::of::<FeatureModule>(),
                TypeKey::of::<RootModule>(),
            ]
        );
        let controllers: Vec<_> = graph.controllers().iter().map(|e| e.controller).collect();
        assert_eq!(
            controllers,
            vec![
                TypeKey::of::<FeatureController>(),
                TypeKey::of::<RootController>(),
            ]
        );
    }

    #[test]
    fn test_missing_module_metadata() {
        let mut graph = ModuleGraph::new(registry());
        match graph.scan::<Unknown>() {
            Err(TrellisError::MissingMetadata { type_name, what }) => {
                assert!(type_name.ends_with("Unknown"));
                assert_eq!(what, "module");
            }
            other => panic!("expected missing metadata, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_circular_import_rejected() {
        let mut graph = ModuleGraph::new(registry());
        match graph.scan::<LoopA>() {
            Err(TrellisError::CircularImport { cycle }) => {
                assert_eq!(cycle, "LoopA -> LoopB -> LoopA");
            }
            other => panic!("expected circular import, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_cross_module_resolution_shares_singleton() {
        let mut graph = ModuleGraph::new(registry());
        graph.scan::<RootModule>().unwrap();

        let feature = graph.resolve::<FeatureService>(None).unwrap();
        let shared = graph
            .resolve::<SharedService>(Some(TypeKey::of::<SharedModule>()))
            .unwrap();
        assert!(Arc::ptr_eq(&feature.shared, &shared));

        // Constructed in the owning module, not in the importer.
        let feature_container = graph.container(TypeKey::of::<FeatureModule>()).unwrap();
        assert!(!feature_container.contains::<SharedService>());
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let mut graph = ModuleGraph::new(registry());
        graph.scan::<RootModule>().unwrap();

        let err = graph.resolve::<Unknown>(None).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_hint_falls_back_to_linear_search() {
        let mut graph = ModuleGraph::new(registry());
        graph.scan::<RootModule>().unwrap();

        let from_root = graph
            .resolve::<SharedService>(Some(TypeKey::of::<RootModule>()))
            .unwrap();
        let direct = graph.resolve::<SharedService>(None).unwrap();
        assert!(Arc::ptr_eq(&from_root, &direct));
    }

    #[test]
    fn test_dispose_clears_singletons() {
        let mut graph = ModuleGraph::new(registry());
        graph.scan::<RootModule>().unwrap();

        let before = graph.resolve::<SharedService>(None).unwrap();
        graph.dispose();
        let after = graph.resolve::<SharedService>(None).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
