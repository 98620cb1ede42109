//! Application Bootstrap
//!
//! Ties the pieces together: scans the module graph, compiles routes, runs
//! the init hooks, then serves requests until shutdown.

use super::shutdown::{ExitStatus, ShutdownHandle, ShutdownOrchestrator, ShutdownReason};
use super::{
    LifecycleManager, OnApplicationBootstrap, OnApplicationShutdown, OnModuleDestroy,
    OnModuleInit, shutdown_signal,
};
use crate::config::AppConfig;
use crate::di::Injectable;
use crate::dispatch::Dispatcher;
use crate::error::{Result, TrellisError};
use crate::exception::{ExceptionFilter, HttpExceptionFilter};
use crate::http::{HttpRequest, HttpResponse};
use crate::interceptor::{Interceptor, InterceptorRef};
use crate::metadata::{MetadataRegistry, TypeKey};
use crate::module::ModuleGraph;
use crate::router::{RouteCompiler, RouteTable};
use axum::Router;
use axum::extract::State;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

type HookBinder = Box<dyn FnOnce(&ModuleGraph, TypeKey, &mut LifecycleManager) -> Result<()> + Send>;

/// A fully initialised application
///
/// Cloning is cheap; every clone serves the same graph and route table.
///
/// # Example
///
/// ```rust,ignore
/// use trellis::Application;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let app = Application::builder(registry)
///         .root_module::<AppModule>()
///         .on_init::<DatabaseService>()
///         .on_destroy::<DatabaseService>()
///         .build()
///         .await?;
///
///     let status = app.listen().await?;
///     std::process::exit(status.code());
/// }
/// ```
#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

struct Inner {
    graph: Arc<ModuleGraph>,
    dispatcher: Dispatcher,
    filter: Arc<dyn ExceptionFilter>,
    orchestrator: ShutdownOrchestrator,
    config: AppConfig,
}

impl Application {
    pub fn builder(registry: MetadataRegistry) -> ApplicationBuilder {
        ApplicationBuilder::new(registry)
    }

    pub fn graph(&self) -> &Arc<ModuleGraph> {
        &self.inner.graph
    }

    pub fn routes(&self) -> &RouteTable {
        self.inner.dispatcher.table()
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// A provider already registered in any scanned module.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.inner.graph.resolve::<T>(None)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.inner.orchestrator.handle().clone()
    }

    pub fn orchestrator(&self) -> &ShutdownOrchestrator {
        &self.inner.orchestrator
    }

    /// Dispatch one request in-process, exception filter included.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let token = self.inner.orchestrator.request_token();
        self.handle_with(request, token).await
    }

    async fn handle_with(&self, request: HttpRequest, token: CancellationToken) -> HttpResponse {
        match self.inner.dispatcher.dispatch(request, token).await {
            Ok(response) => response,
            Err(mut escalation) => {
                self.inner
                    .filter
                    .catch(&escalation.error, &escalation.request, &mut escalation.response);
                escalation.response
            }
        }
    }

    /// The whole application as an axum service; every path is routed by
    /// the compiled route table.
    pub fn router(&self) -> Router {
        Router::new().fallback(transport).with_state(self.clone())
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn listen(self) -> Result<ExitStatus> {
        let addr = self.inner.config.addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "Listening");
        Ok(self.serve(listener).await)
    }

    /// Serve on `listener` until a termination signal, a shutdown request
    /// or a transport failure, then shut down gracefully.
    ///
    /// Panics only count as fatal once the binary has called
    /// [`ShutdownHandle::request_on_panic`] on [`shutdown_handle`](Self::shutdown_handle).
    pub async fn serve(self, listener: TcpListener) -> ExitStatus {
        self.serve_with(listener, |router| router).await
    }

    /// Like [`serve`](Self::serve), with `wrap` applied to the router first
    /// (typically to add tower layers).
    pub async fn serve_with<F>(self, listener: TcpListener, wrap: F) -> ExitStatus
    where
        F: FnOnce(Router) -> Router,
    {
        let stop = self.inner.orchestrator.stop_token();
        let router = wrap(self.router());
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
        });

        let handle = self.shutdown_handle();
        let trigger = tokio::select! {
            _ = shutdown_signal() => Trigger::Requested(ShutdownReason::Signal),
            reason = handle.requested() => Trigger::Requested(reason),
            result = &mut server => Trigger::Stopped(flatten(result)),
        };
        let (reason, transport): (ShutdownReason, BoxFuture<'static, std::io::Result<()>>) =
            match trigger {
                Trigger::Requested(reason) => (reason, joined(server).boxed()),
                Trigger::Stopped(result) => {
                    let reason = match result {
                        Ok(()) => "transport stopped unexpectedly".to_string(),
                        Err(e) => e.to_string(),
                    };
                    (ShutdownReason::Fatal(reason), futures::future::ready(Ok(())).boxed())
                }
            };

        self.inner
            .orchestrator
            .shutdown(reason, transport)
            .await
            .unwrap_or(ExitStatus::Failure)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("dispatcher", &self.inner.dispatcher)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

enum Trigger {
    Requested(ShutdownReason),
    Stopped(std::io::Result<()>),
}

/// Fallback handler owning every request handed over by axum.
async fn transport(State(app): State<Application>, request: axum::extract::Request) -> HttpResponse {
    let token = app.inner.orchestrator.request_token();
    // Cancels the request's work if axum drops this future (client gone).
    let _guard = token.clone().drop_guard();
    app.handle_with(HttpRequest::from_axum(request), token).await
}

async fn joined(server: tokio::task::JoinHandle<std::io::Result<()>>) -> std::io::Result<()> {
    flatten(server.await)
}

fn flatten(
    result: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) -> std::io::Result<()> {
    result.map_err(std::io::Error::other)?
}

/// Builder for Application
pub struct ApplicationBuilder {
    registry: MetadataRegistry,
    root: Option<TypeKey>,
    config: AppConfig,
    global_interceptors: Vec<InterceptorRef>,
    filter: Arc<dyn ExceptionFilter>,
    hooks: Vec<HookBinder>,
    init_timeout: Option<Duration>,
    bootstrap_timeout: Option<Duration>,
}

impl ApplicationBuilder {
    pub fn new(registry: MetadataRegistry) -> Self {
        Self {
            registry,
            root: None,
            config: AppConfig::default(),
            global_interceptors: Vec::new(),
            filter: Arc::new(HttpExceptionFilter),
            hooks: Vec::new(),
            init_timeout: None,
            bootstrap_timeout: None,
        }
    }

    pub fn root_module<M: 'static>(mut self) -> Self {
        self.root = Some(TypeKey::of::<M>());
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn global_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.global_prefix = prefix.into();
        self
    }

    /// Runs before route matching and, outermost, around every handler.
    pub fn global_interceptor(mut self, interceptor: InterceptorRef) -> Self {
        self.global_interceptors.push(interceptor);
        self
    }

    pub fn exception_filter<F: ExceptionFilter>(mut self, filter: F) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    pub fn bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = Some(timeout);
        self
    }

    /// Register provider `T`'s OnModuleInit hook.
    pub fn on_init<T: OnModuleInit + Injectable>(self) -> Self {
        self.bind_hook(|graph, root, manager| {
            manager.on_init(locate::<T>(graph, root)?, short_name::<T>());
            Ok(())
        })
    }

    pub fn on_bootstrap<T: OnApplicationBootstrap + Injectable>(self) -> Self {
        self.bind_hook(|graph, root, manager| {
            manager.on_bootstrap(locate::<T>(graph, root)?, short_name::<T>());
            Ok(())
        })
    }

    pub fn on_shutdown<T: OnApplicationShutdown + Injectable>(self) -> Self {
        self.bind_hook(|graph, root, manager| {
            manager.on_shutdown(locate::<T>(graph, root)?, short_name::<T>());
            Ok(())
        })
    }

    pub fn on_destroy<T: OnModuleDestroy + Injectable>(self) -> Self {
        self.bind_hook(|graph, root, manager| {
            manager.on_destroy(locate::<T>(graph, root)?, short_name::<T>());
            Ok(())
        })
    }

    fn bind_hook<F>(mut self, binder: F) -> Self
    where
        F: FnOnce(&ModuleGraph, TypeKey, &mut LifecycleManager) -> Result<()> + Send + 'static,
    {
        self.hooks.push(Box::new(binder));
        self
    }

    /// Scan, compile and initialise.
    ///
    /// # Errors
    ///
    /// Any configuration error, or the first failing init/bootstrap hook.
    pub async fn build(self) -> Result<Application> {
        let root = self
            .root
            .ok_or_else(|| TrellisError::missing("Application", "root module"))?;

        tracing::info!("Starting application initialization...");
        let mut graph = ModuleGraph::new(Arc::new(self.registry));
        graph.scan_module(root)?;

        let global_interceptors = self
            .global_interceptors
            .iter()
            .map(|interceptor| interceptor.resolve(&graph, root))
            .collect::<Result<Vec<Arc<dyn Interceptor>>>>()?;

        let table = RouteCompiler::new(&graph)
            .global_prefix(self.config.global_prefix.clone())
            .global_interceptors(global_interceptors.clone())
            .compile()?;

        let mut lifecycle = LifecycleManager::new();
        for bind in self.hooks {
            bind(&graph, root, &mut lifecycle)?;
        }

        lifecycle
            .start(self.init_timeout, self.bootstrap_timeout)
            .await?;

        let graph = Arc::new(graph);
        let dispatcher = Dispatcher::new(Arc::new(table))
            .with_global_interceptors(global_interceptors)
            .with_body_limit(self.config.body_limit);
        let orchestrator = ShutdownOrchestrator::new(
            Arc::new(lifecycle),
            Arc::clone(&graph),
            self.config.shutdown_timeout,
        );

        tracing::info!(
            modules = graph.len(),
            routes = dispatcher.table().len(),
            "Application initialization complete"
        );

        Ok(Application {
            inner: Arc::new(Inner {
                graph,
                dispatcher,
                filter: self.filter,
                orchestrator,
                config: self.config,
            }),
        })
    }
}

/// Registered provider of `T` anywhere in the graph, else constructed in
/// the root module.
fn locate<T: Injectable>(graph: &ModuleGraph, root: TypeKey) -> Result<Arc<T>> {
    match graph.resolve::<T>(None) {
        Err(e) if e.is_not_found() => graph.get::<T>(root),
        other => other,
    }
}

fn short_name<T: 'static>() -> &'static str {
    TypeKey::of::<T>().short_name()
}
