use super::TypeKey;
use crate::di::{Injectable, Provider};
use axum::http::Method;
use std::fmt;

/// How long a constructed provider lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// One instance per container, cached on first resolution.
    #[default]
    Singleton,
    /// A fresh instance on every resolution, never cached.
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMetadata {
    pub path: String,
}

/// One declared route of a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMetadata {
    pub method: Method,
    pub path: String,
    /// Handler member name; member-level records are stored under it.
    pub member: String,
}

/// Where a handler argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Path,
    Query,
    Body,
    Headers,
    Request,
    Response,
}

/// Binding of one handler argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMetadata {
    /// Position of the argument in the handler's [`Args`](crate::dispatch::Args).
    pub index: usize,
    pub kind: ParamKind,
    /// Sub-key (param name, query key, body field, header name).
    pub key: Option<String>,
}

impl ParamMetadata {
    pub fn new(index: usize, kind: ParamKind, key: Option<&str>) -> Self {
        Self {
            index,
            kind,
            key: key.map(str::to_string),
        }
    }
}

/// Composition of a module: what it imports, declares and exposes.
///
/// `exports` is recorded for documentation and tooling; provider lookup
/// does not enforce it as a visibility boundary.
#[derive(Clone, Default)]
pub struct ModuleMetadata {
    pub imports: Vec<TypeKey>,
    pub controllers: Vec<Provider>,
    pub providers: Vec<Provider>,
    pub exports: Vec<TypeKey>,
}

impl ModuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import<M: 'static>(mut self) -> Self {
        self.imports.push(TypeKey::of::<M>());
        self
    }

    pub fn controller<C: Injectable>(mut self) -> Self {
        self.controllers.push(Provider::of::<C>());
        self
    }

    pub fn provider<T: Injectable>(mut self) -> Self {
        self.providers.push(Provider::of::<T>());
        self
    }

    /// Provide an already constructed instance.
    pub fn value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.providers.push(Provider::value(value));
        self
    }

    pub fn export<T: 'static>(mut self) -> Self {
        self.exports.push(TypeKey::of::<T>());
        self
    }
}

impl fmt::Debug for ModuleMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleMetadata")
            .field("imports", &self.imports)
            .field("controllers", &self.controllers)
            .field("providers", &self.providers)
            .field("exports", &self.exports)
            .finish()
    }
}
