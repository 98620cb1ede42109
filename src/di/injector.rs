use crate::di::{Container, Injectable, Instance, Provider};
use crate::error::{Result, TrellisError};
use crate::metadata::TypeKey;
use crate::module::ModuleGraph;
use std::sync::Arc;

/// Resolution context handed to [`Injectable::inject`].
///
/// Tracks the chain of providers currently being constructed so that a
/// dependency cycle fails with [`TrellisError::CircularDependency`] instead
/// of recursing forever.
pub struct Injector<'a> {
    container: &'a Container,
    graph: Option<&'a ModuleGraph>,
    stack: Vec<TypeKey>,
}

impl<'a> Injector<'a> {
    pub(crate) fn new(container: &'a Container, graph: Option<&'a ModuleGraph>) -> Self {
        Self {
            container,
            graph,
            stack: Vec::new(),
        }
    }

    /// Module whose container is performing the resolution.
    pub fn module(&self) -> TypeKey {
        self.container.module()
    }

    /// Resolve a constructible dependency.
    ///
    /// Lookup order: the current container, then every scanned module. A
    /// type that nobody registered is constructed in the current container.
    pub fn get<T: Injectable>(&mut self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        if !self.container.has(key) && self.locate(key).is_none() {
            tracing::debug!(
                provider = ?key,
                module = ?self.container.module(),
                "Registering implicit provider"
            );
            self.container.add_provider(Provider::of::<T>());
        }
        downcast(self.resolve_key(key)?)
    }

    /// Resolve a dependency that must have been registered somewhere,
    /// typically a value provider.
    pub fn lookup<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        downcast(self.resolve_key(TypeKey::of::<T>())?)
    }

    /// Like [`lookup`](Self::lookup), but an unprovided type binds to `None`.
    pub fn optional<T: Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>> {
        match self.lookup::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn resolve_key(&mut self, key: TypeKey) -> Result<Instance> {
        if let Some(start) = self.stack.iter().position(|entry| *entry == key) {
            let cycle = self.stack[start..]
                .iter()
                .chain(std::iter::once(&key))
                .map(|entry| entry.short_name())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(TrellisError::CircularDependency { cycle });
        }

        let target = if self.container.has(key) {
            self.container
        } else {
            self.locate(key)
                .ok_or_else(|| TrellisError::not_found(key.name()))?
        };

        self.stack.push(key);
        let result = if std::ptr::eq(target, self.container) {
            target.instantiate(key, self)
        } else {
            // Dependencies of a provider owned by another module resolve
            // from that module's container, sharing the cycle stack.
            let mut nested = Injector {
                container: target,
                graph: self.graph,
                stack: std::mem::take(&mut self.stack),
            };
            let result = target.instantiate(key, &mut nested);
            self.stack = nested.stack;
            result
        };
        self.stack.pop();
        result
    }

    fn locate(&self, key: TypeKey) -> Option<&'a Container> {
        self.graph?.container_of(key)
    }
}

fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| TrellisError::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        })
}
