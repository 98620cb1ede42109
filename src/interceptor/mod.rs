use crate::di::{ComponentRef, Injectable};
use crate::dispatch::{ExecutionContext, HandlerResult, Reply};
use crate::metadata::TypeKey;
use crate::module::ModuleGraph;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

mod logging;

pub use logging::LoggingInterceptor;

/// Represents the rest of the chain, down to the handler
pub struct Next {
    run: Box<dyn FnOnce() -> BoxFuture<'static, HandlerResult> + Send>,
}

impl Next {
    /// Create a new Next handler
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, HandlerResult> + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// A chain end that does nothing, handed to global interceptors before
    /// any route is matched.
    pub fn noop() -> Self {
        Self::new(|| Box::pin(async { Ok(Reply::Empty) }))
    }

    /// Execute the rest of the chain
    pub async fn run(self) -> HandlerResult {
        (self.run)().await
    }
}

/// The Interceptor trait
///
/// Interceptors wrap handler invocation onion-style: the outermost one runs
/// its pre-handler logic first and its post-handler logic last. Global
/// interceptors are outermost, then controller interceptors, then route
/// interceptors.
///
/// # Example
/// ```
/// use trellis::prelude::*;
///
/// struct Envelope;
///
/// #[async_trait]
/// impl Interceptor for Envelope {
///     async fn intercept(&self, _context: &ExecutionContext, next: Next) -> HandlerResult {
///         match next.run().await? {
///             Reply::Json(data) => Ok(Reply::Json(serde_json::json!({ "data": data }))),
///             other => Ok(other),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, context: &ExecutionContext, next: Next) -> HandlerResult;
}

/// Interceptor attachment, resolved once at route compilation.
pub type InterceptorRef = ComponentRef<dyn Interceptor>;

impl ComponentRef<dyn Interceptor> {
    /// Interceptor type constructed (as a singleton) by the DI container.
    pub fn of<I: Interceptor + Injectable>() -> Self {
        Self::Unresolved {
            key: TypeKey::of::<I>(),
            resolve: resolve_interceptor::<I>,
        }
    }

    /// Interceptor instance supplied as is.
    pub fn instance<I: Interceptor>(interceptor: I) -> Self {
        Self::Resolved(Arc::new(interceptor))
    }
}

fn resolve_interceptor<I: Interceptor + Injectable>(
    graph: &ModuleGraph,
    module: TypeKey,
) -> crate::Result<Arc<dyn Interceptor>> {
    let interceptor: Arc<dyn Interceptor> = graph.get::<I>(module)?;
    Ok(interceptor)
}

/// Wrap `handler` in `interceptors`, the first being the outermost layer.
pub(crate) fn chain(
    interceptors: &[Arc<dyn Interceptor>],
    context: &ExecutionContext,
    handler: Next,
) -> Next {
    let mut next = handler;
    for interceptor in interceptors.iter().rev() {
        let interceptor = Arc::clone(interceptor);
        let context = context.clone();
        let inner = next;
        next = Next::new(move || {
            Box::pin(async move { interceptor.intercept(&context, inner).await })
        });
    }
    next
}
