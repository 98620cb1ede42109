use crate::error::Result;
use crate::metadata::TypeKey;
use crate::module::ModuleGraph;
use std::fmt;
use std::sync::Arc;

/// Resolves an unresolved reference through the module graph, constructing
/// the component in `module`'s container when nobody provides it.
pub type ResolveFn<T> = fn(&ModuleGraph, TypeKey) -> Result<Arc<T>>;

/// A guard or interceptor attachment: either an instance built by the
/// caller or a type the container must construct.
///
/// References are resolved exactly once, while routes are compiled.
pub enum ComponentRef<T: ?Sized> {
    Resolved(Arc<T>),
    Unresolved { key: TypeKey, resolve: ResolveFn<T> },
}

impl<T: ?Sized> ComponentRef<T> {
    /// Produce the instance, resolving through `module` when needed.
    pub fn resolve(&self, graph: &ModuleGraph, module: TypeKey) -> Result<Arc<T>> {
        match self {
            Self::Resolved(instance) => Ok(Arc::clone(instance)),
            Self::Unresolved { resolve, .. } => resolve(graph, module),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl<T: ?Sized> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Resolved(instance) => Self::Resolved(Arc::clone(instance)),
            Self::Unresolved { key, resolve } => Self::Unresolved {
                key: *key,
                resolve: *resolve,
            },
        }
    }
}

impl<T: ?Sized> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(_) => f.write_str("Resolved(..)"),
            Self::Unresolved { key, .. } => f.debug_tuple("Unresolved").field(key).finish(),
        }
    }
}
