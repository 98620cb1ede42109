use crate::di::Instance;
use crate::dispatch::{HandlerFn, RouteInfo};
use crate::error::{Result, TrellisError};
use crate::guard::Guard;
use crate::http::PathParams;
use crate::interceptor::Interceptor;
use crate::metadata::{ParamMetadata, TypeKey};
use crate::module::ModuleGraph;
use crate::router::path::{PathPattern, join_paths};
use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// An immutable, pre-resolved dispatch-table entry.
pub struct CompiledRoute {
    pub info: Arc<RouteInfo>,
    pub pattern: PathPattern,
    pub controller: Instance,
    /// Class-level guards first, then method-level.
    pub guards: Box<[Arc<dyn Guard>]>,
    /// Global, then class-level, then method-level.
    pub interceptors: Box<[Arc<dyn Interceptor>]>,
    pub params: Arc<[ParamMetadata]>,
    pub handler: HandlerFn,
}

impl CompiledRoute {
    /// Neither guards nor interceptors: the handler can be called directly.
    pub fn is_bare(&self) -> bool {
        self.guards.is_empty() && self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("method", &self.info.method)
            .field("path", &self.info.path)
            .field("controller", &self.info.controller)
            .field("member", &self.info.member)
            .field("guards", &self.guards.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// Compiled routes, grouped by method and kept in compile order.
#[derive(Debug, Default)]
pub struct RouteTable {
    by_method: HashMap<Method, Vec<Arc<CompiledRoute>>>,
    all: Vec<Arc<CompiledRoute>>,
}

impl RouteTable {
    fn push(&mut self, route: CompiledRoute) {
        let route = Arc::new(route);
        self.by_method
            .entry(route.info.method.clone())
            .or_default()
            .push(Arc::clone(&route));
        self.all.push(route);
    }

    /// First route, in declaration order, whose pattern matches `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&Arc<CompiledRoute>, PathParams)> {
        self.by_method
            .get(method)?
            .iter()
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }

    pub fn has_method(&self, method: &Method) -> bool {
        self.by_method.contains_key(method)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteInfo> {
        self.all.iter().map(|route| &*route.info)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Builds the [`RouteTable`] from the scanned module graph and the
/// controller metadata in its registry.
pub struct RouteCompiler<'g> {
    graph: &'g ModuleGraph,
    global_prefix: String,
    global_interceptors: Vec<Arc<dyn Interceptor>>,
    plans: HashMap<(TypeKey, String), Arc<[ParamMetadata]>>,
}

impl<'g> RouteCompiler<'g> {
    pub fn new(graph: &'g ModuleGraph) -> Self {
        Self {
            graph,
            global_prefix: String::new(),
            global_interceptors: Vec::new(),
            plans: HashMap::new(),
        }
    }

    pub fn global_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.global_prefix = prefix.into();
        self
    }

    pub fn global_interceptors(mut self, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        self.global_interceptors = interceptors;
        self
    }

    pub fn compile(mut self) -> Result<RouteTable> {
        let mut table = RouteTable::default();
        let graph = self.graph;
        let registry = graph.registry();

        for entry in graph.controllers() {
            let controller = entry.controller;
            let module = entry.module;
            let instance = graph.resolve_key(controller, Some(module))?;
            let base = join_paths(&[&self.global_prefix, registry.controller_path(controller)]);

            let class_guards = registry
                .guards(controller, None)
                .iter()
                .map(|guard| guard.resolve(graph, module))
                .collect::<Result<Vec<_>>>()?;
            let class_interceptors = registry
                .interceptors(controller, None)
                .iter()
                .map(|interceptor| interceptor.resolve(graph, module))
                .collect::<Result<Vec<_>>>()?;

            for route in registry.routes(controller) {
                let member = route.member.as_str();
                let handler = registry.handler(controller, member).cloned().ok_or_else(|| {
                    TrellisError::missing(format!("{}::{member}", controller.name()), "handler")
                })?;

                let path = join_paths(&[&base, &route.path]);
                let pattern = PathPattern::compile(&path)?;

                let mut guards = class_guards.clone();
                for guard in registry.guards(controller, Some(member)) {
                    guards.push(guard.resolve(graph, module)?);
                }

                let mut interceptors = self.global_interceptors.clone();
                interceptors.extend(class_interceptors.iter().cloned());
                for interceptor in registry.interceptors(controller, Some(member)) {
                    interceptors.push(interceptor.resolve(graph, module)?);
                }

                let params = self
                    .plans
                    .entry((controller, member.to_string()))
                    .or_insert_with(|| registry.params(controller, member).into())
                    .clone();

                debug!(
                    method = %route.method,
                    path = %path,
                    controller = controller.short_name(),
                    member,
                    guards = guards.len(),
                    interceptors = interceptors.len(),
                    simple = pattern.is_simple(),
                    "Compiled route"
                );

                table.push(CompiledRoute {
                    info: Arc::new(RouteInfo {
                        method: route.method.clone(),
                        path,
                        controller,
                        member: member.to_string(),
                    }),
                    pattern,
                    controller: Arc::clone(&instance),
                    guards: guards.into_boxed_slice(),
                    interceptors: interceptors.into_boxed_slice(),
                    params,
                    handler,
                });
            }
        }

        let routes_summary: Vec<String> = table
            .routes()
            .take(10)
            .map(|route| format!("{} {}", route.method, route.path))
            .collect();
        info!(
            routes_count = table.len(),
            global_prefix = %self.global_prefix,
            routes_summary = ?routes_summary,
            "Routing table compiled"
        );

        Ok(table)
    }
}
