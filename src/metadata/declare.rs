use super::{MetadataKey, MetadataRecord, MetadataRegistry, ParamKind, ParamMetadata, RouteMetadata, TypeKey};
use crate::di::Instance;
use crate::dispatch::{Args, ExecutionContext, HandlerError, HandlerFn, HandlerResult};
use crate::error::TrellisError;
use crate::guard::GuardRef;
use crate::interceptor::InterceptorRef;
use axum::http::Method;
use futures::future::BoxFuture;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Attaches class-level and route-level metadata for controller `C`.
pub struct ControllerBuilder<'r, C> {
    pub(super) registry: &'r mut MetadataRegistry,
    pub(super) _controller: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> ControllerBuilder<'_, C> {
    /// Guard for every route of the controller; class guards run before route guards.
    pub fn guard(self, guard: GuardRef) -> Self {
        let records = self.registry.records_mut(TypeKey::of::<C>(), None);
        if let MetadataRecord::Guards(guards) = records
            .entry(MetadataKey::Guards)
            .or_insert_with(|| MetadataRecord::Guards(Vec::new()))
        {
            guards.push(guard);
        }
        self
    }

    pub fn interceptor(self, interceptor: InterceptorRef) -> Self {
        let records = self.registry.records_mut(TypeKey::of::<C>(), None);
        if let MetadataRecord::Interceptors(list) = records
            .entry(MetadataKey::Interceptors)
            .or_insert_with(|| MetadataRecord::Interceptors(Vec::new()))
        {
            list.push(interceptor);
        }
        self
    }

    pub fn route(self, route: RouteDef<C>) -> Self {
        let target = TypeKey::of::<C>();
        let RouteDef {
            metadata,
            params,
            guards,
            interceptors,
            handler,
            ..
        } = route;
        let member = metadata.member.clone();

        let records = self.registry.records_mut(target, None);
        if let MetadataRecord::Routes(routes) = records
            .entry(MetadataKey::Routes)
            .or_insert_with(|| MetadataRecord::Routes(Vec::new()))
        {
            routes.push(metadata);
        }

        let member = Some(member.as_str());
        self.registry
            .attach(target, member, MetadataRecord::Params(params));
        if !guards.is_empty() {
            self.registry
                .attach(target, member, MetadataRecord::Guards(guards));
        }
        if !interceptors.is_empty() {
            self.registry
                .attach(target, member, MetadataRecord::Interceptors(interceptors));
        }
        if let Some(handler) = handler {
            self.registry
                .attach(target, member, MetadataRecord::Handler(handler));
        }
        self
    }
}

/// Declaration of one route on controller `C`.
///
/// Parameter bindings are positional: each `param` call binds the next
/// argument index, in declaration order.
pub struct RouteDef<C> {
    metadata: RouteMetadata,
    params: Vec<ParamMetadata>,
    guards: Vec<GuardRef>,
    interceptors: Vec<InterceptorRef>,
    handler: Option<HandlerFn>,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> RouteDef<C> {
    pub fn new(method: Method, path: &str, member: &str) -> Self {
        Self {
            metadata: RouteMetadata {
                method,
                path: path.to_string(),
                member: member.to_string(),
            },
            params: Vec::new(),
            guards: Vec::new(),
            interceptors: Vec::new(),
            handler: None,
            _controller: PhantomData,
        }
    }

    pub fn get(path: &str, member: &str) -> Self {
        Self::new(Method::GET, path, member)
    }

    pub fn post(path: &str, member: &str) -> Self {
        Self::new(Method::POST, path, member)
    }

    pub fn put(path: &str, member: &str) -> Self {
        Self::new(Method::PUT, path, member)
    }

    pub fn patch(path: &str, member: &str) -> Self {
        Self::new(Method::PATCH, path, member)
    }

    pub fn delete(path: &str, member: &str) -> Self {
        Self::new(Method::DELETE, path, member)
    }

    pub fn param(mut self, kind: ParamKind, key: Option<&str>) -> Self {
        let index = self.params.len();
        self.params.push(ParamMetadata::new(index, kind, key));
        self
    }

    pub fn path_param(self, name: &str) -> Self {
        self.param(ParamKind::Path, Some(name))
    }

    pub fn query(self, key: &str) -> Self {
        self.param(ParamKind::Query, Some(key))
    }

    pub fn query_all(self) -> Self {
        self.param(ParamKind::Query, None)
    }

    pub fn body(self) -> Self {
        self.param(ParamKind::Body, None)
    }

    pub fn body_field(self, field: &str) -> Self {
        self.param(ParamKind::Body, Some(field))
    }

    pub fn header(self, name: &str) -> Self {
        self.param(ParamKind::Headers, Some(name))
    }

    pub fn headers(self) -> Self {
        self.param(ParamKind::Headers, None)
    }

    pub fn request(self) -> Self {
        self.param(ParamKind::Request, None)
    }

    pub fn response(self) -> Self {
        self.param(ParamKind::Response, None)
    }

    /// Method-level guard, runs after the controller's guards.
    pub fn guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    /// Method-level interceptor, the innermost layer around the handler.
    pub fn interceptor(mut self, interceptor: InterceptorRef) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<C>, Args, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let erased: HandlerFn = Arc::new(
            move |instance: Instance, args: Args, context: ExecutionContext| -> BoxFuture<'static, HandlerResult> {
                match instance.downcast::<C>() {
                    Ok(controller) => Box::pin(handler(controller, args, context)),
                    Err(_) => {
                        let error: HandlerError = Box::new(TrellisError::DowncastFailed {
                            type_name: std::any::type_name::<C>().to_string(),
                        });
                        Box::pin(async move { HandlerResult::Err(error) })
                    }
                }
            },
        );
        self.handler = Some(erased);
        self
    }
}
