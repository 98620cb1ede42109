use crate::di::{ComponentRef, Injectable};
use crate::dispatch::{ExecutionContext, HandlerError};
use crate::metadata::TypeKey;
use crate::module::ModuleGraph;
use async_trait::async_trait;
use std::sync::Arc;

/// Permits or denies a request before its handler runs
///
/// Guards of a route run one at a time in declared order (controller guards
/// first). The first guard returning `Ok(false)` ends the request with 403;
/// an `Err` is escalated to the exception filter.
///
/// # Example
/// ```
/// use trellis::prelude::*;
///
/// struct ApiKeyGuard;
///
/// #[async_trait]
/// impl Guard for ApiKeyGuard {
///     async fn can_activate(&self, context: &ExecutionContext) -> Result<bool, HandlerError> {
///         Ok(context.request().header("x-api-key") == Some("secret"))
///     }
/// }
/// ```
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, context: &ExecutionContext) -> Result<bool, HandlerError>;
}

/// Guard attachment, resolved once at route compilation.
pub type GuardRef = ComponentRef<dyn Guard>;

impl ComponentRef<dyn Guard> {
    /// Guard type constructed (as a singleton) by the DI container.
    pub fn of<G: Guard + Injectable>() -> Self {
        Self::Unresolved {
            key: TypeKey::of::<G>(),
            resolve: resolve_guard::<G>,
        }
    }

    /// Guard instance supplied as is.
    pub fn instance<G: Guard>(guard: G) -> Self {
        Self::Resolved(Arc::new(guard))
    }
}

fn resolve_guard<G: Guard + Injectable>(
    graph: &ModuleGraph,
    module: TypeKey,
) -> crate::Result<Arc<dyn Guard>> {
    let guard: Arc<dyn Guard> = graph.get::<G>(module)?;
    Ok(guard)
}
