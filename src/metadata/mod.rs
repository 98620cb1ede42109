//! Metadata Registry
//!
//! An explicit, process-scoped store of declarative metadata keyed by
//! component type (and optionally a member name). It is written once while
//! the application is being declared and is read-only afterwards: the
//! module graph and the route compiler only ever hold it behind an `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis::metadata::{MetadataRegistry, ModuleMetadata, RouteDef};
//!
//! let mut registry = MetadataRegistry::new();
//! registry
//!     .controller::<UsersController>("/users")
//!     .route(RouteDef::get("/:id", "find_one").path_param("id").handler(find_one));
//! registry.module::<AppModule>(
//!     ModuleMetadata::new()
//!         .controller::<UsersController>()
//!         .provider::<UsersService>(),
//! );
//! ```

mod declare;
mod records;

pub use declare::{ControllerBuilder, RouteDef};
pub use records::{
    ControllerMetadata, ModuleMetadata, ParamKind, ParamMetadata, ProviderMetadata,
    RouteMetadata, Scope,
};

use crate::dispatch::HandlerFn;
use crate::guard::GuardRef;
use crate::interceptor::InterceptorRef;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Stable identity of a component type, used as the key everywhere.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Discriminant of a [`MetadataRecord`]; one record per key per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Controller,
    Routes,
    Handler,
    Params,
    Guards,
    Interceptors,
    Module,
    Provider,
}

/// A single piece of declarative metadata.
#[derive(Clone)]
pub enum MetadataRecord {
    Controller(ControllerMetadata),
    Routes(Vec<RouteMetadata>),
    Handler(HandlerFn),
    Params(Vec<ParamMetadata>),
    Guards(Vec<GuardRef>),
    Interceptors(Vec<InterceptorRef>),
    Module(ModuleMetadata),
    Provider(ProviderMetadata),
}

impl MetadataRecord {
    pub fn key(&self) -> MetadataKey {
        match self {
            Self::Controller(_) => MetadataKey::Controller,
            Self::Routes(_) => MetadataKey::Routes,
            Self::Handler(_) => MetadataKey::Handler,
            Self::Params(_) => MetadataKey::Params,
            Self::Guards(_) => MetadataKey::Guards,
            Self::Interceptors(_) => MetadataKey::Interceptors,
            Self::Module(_) => MetadataKey::Module,
            Self::Provider(_) => MetadataKey::Provider,
        }
    }
}

impl fmt::Debug for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(meta) => f.debug_tuple("Controller").field(meta).finish(),
            Self::Routes(routes) => f.debug_tuple("Routes").field(routes).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Params(params) => f.debug_tuple("Params").field(params).finish(),
            Self::Guards(guards) => f.debug_tuple("Guards").field(&guards.len()).finish(),
            Self::Interceptors(list) => f.debug_tuple("Interceptors").field(&list.len()).finish(),
            Self::Module(meta) => f.debug_tuple("Module").field(meta).finish(),
            Self::Provider(meta) => f.debug_tuple("Provider").field(meta).finish(),
        }
    }
}

type Records = HashMap<MetadataKey, MetadataRecord>;

#[derive(Default)]
struct TypeMetadata {
    own: Records,
    members: HashMap<String, Records>,
}

/// Declarative metadata for every component type of the application.
#[derive(Default)]
pub struct MetadataRegistry {
    types: HashMap<TypeKey, TypeMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under `(target, member)`, replacing any record of the same kind.
    pub fn attach(&mut self, target: TypeKey, member: Option<&str>, record: MetadataRecord) {
        self.records_mut(target, member).insert(record.key(), record);
    }

    /// Read the record of kind `key` stored under `(target, member)`.
    pub fn read(
        &self,
        target: TypeKey,
        member: Option<&str>,
        key: MetadataKey,
    ) -> Option<&MetadataRecord> {
        let entry = self.types.get(&target)?;
        let records = match member {
            None => &entry.own,
            Some(member) => entry.members.get(member)?,
        };
        records.get(&key)
    }

    /// `true` when anything at all was declared for `target`.
    pub fn contains(&self, target: TypeKey) -> bool {
        self.types.contains_key(&target)
    }

    pub(crate) fn records_mut(&mut self, target: TypeKey, member: Option<&str>) -> &mut Records {
        let entry = self.types.entry(target).or_default();
        match member {
            None => &mut entry.own,
            Some(member) => entry.members.entry(member.to_string()).or_default(),
        }
    }

    // Declaration surface

    /// Declare `C` as a controller mounted under `path`.
    pub fn controller<C: Send + Sync + 'static>(&mut self, path: &str) -> ControllerBuilder<'_, C> {
        self.attach(
            TypeKey::of::<C>(),
            None,
            MetadataRecord::Controller(ControllerMetadata {
                path: path.to_string(),
            }),
        );
        ControllerBuilder {
            registry: self,
            _controller: PhantomData,
        }
    }

    /// Declare the composition of module `M`.
    pub fn module<M: 'static>(&mut self, metadata: ModuleMetadata) -> &mut Self {
        self.attach(TypeKey::of::<M>(), None, MetadataRecord::Module(metadata));
        self
    }

    /// Declare the scope `T` is provided with. Undeclared providers are singletons.
    pub fn injectable<T: 'static>(&mut self, scope: Scope) -> &mut Self {
        self.attach(
            TypeKey::of::<T>(),
            None,
            MetadataRecord::Provider(ProviderMetadata { scope }),
        );
        self
    }

    // Typed readers

    /// Base path of a controller, empty when none was declared.
    pub fn controller_path(&self, target: TypeKey) -> &str {
        match self.read(target, None, MetadataKey::Controller) {
            Some(MetadataRecord::Controller(meta)) => &meta.path,
            _ => "",
        }
    }

    pub fn routes(&self, target: TypeKey) -> &[RouteMetadata] {
        match self.read(target, None, MetadataKey::Routes) {
            Some(MetadataRecord::Routes(routes)) => routes,
            _ => &[],
        }
    }

    pub fn handler(&self, target: TypeKey, member: &str) -> Option<&HandlerFn> {
        match self.read(target, Some(member), MetadataKey::Handler) {
            Some(MetadataRecord::Handler(handler)) => Some(handler),
            _ => None,
        }
    }

    pub fn params(&self, target: TypeKey, member: &str) -> &[ParamMetadata] {
        match self.read(target, Some(member), MetadataKey::Params) {
            Some(MetadataRecord::Params(params)) => params,
            _ => &[],
        }
    }

    /// Guards declared on the class (`member == None`) or on one route member.
    pub fn guards(&self, target: TypeKey, member: Option<&str>) -> &[GuardRef] {
        match self.read(target, member, MetadataKey::Guards) {
            Some(MetadataRecord::Guards(guards)) => guards,
            _ => &[],
        }
    }

    pub fn interceptors(&self, target: TypeKey, member: Option<&str>) -> &[InterceptorRef] {
        match self.read(target, member, MetadataKey::Interceptors) {
            Some(MetadataRecord::Interceptors(list)) => list,
            _ => &[],
        }
    }

    pub fn module_metadata(&self, target: TypeKey) -> Option<&ModuleMetadata> {
        match self.read(target, None, MetadataKey::Module) {
            Some(MetadataRecord::Module(meta)) => Some(meta),
            _ => None,
        }
    }

    pub fn scope(&self, target: TypeKey) -> Scope {
        match self.read(target, None, MetadataKey::Provider) {
            Some(MetadataRecord::Provider(meta)) => meta.scope,
            _ => Scope::Singleton,
        }
    }
}
