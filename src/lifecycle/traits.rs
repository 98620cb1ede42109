//! Lifecycle hook traits
//!
//! Implemented by providers that need to take part in startup or shutdown.
//! Hooks are invoked on the shared singleton instance, so any state they
//! change must be behind the provider's own synchronization.

use super::LifecycleError;
use async_trait::async_trait;

/// Called once the module graph is scanned and routes are compiled
///
/// Use this hook to open connections or warm caches. A failure aborts
/// startup.
///
/// # Example
///
/// ```rust,ignore
/// use trellis::lifecycle::{OnModuleInit, LifecycleError};
/// use async_trait::async_trait;
///
/// #[async_trait]
/// impl OnModuleInit for DatabaseService {
///     async fn on_module_init(&self) -> Result<(), LifecycleError> {
///         let pool = create_pool(&self.config)
///             .await
///             .map_err(|e| LifecycleError::failed(e.to_string()))?;
///         *self.pool.write().await = Some(pool);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait OnModuleInit: Send + Sync {
    async fn on_module_init(&self) -> Result<(), LifecycleError>;
}

/// Called after every OnModuleInit hook succeeded
///
/// The last hook before the application starts accepting requests.
#[async_trait]
pub trait OnApplicationBootstrap: Send + Sync {
    async fn on_application_bootstrap(&self) -> Result<(), LifecycleError>;
}

/// Called when shutdown begins, before the transport stops accepting
/// connections
///
/// Failures are logged and do not stop the remaining hooks.
#[async_trait]
pub trait OnApplicationShutdown: Send + Sync {
    async fn on_application_shutdown(&self) -> Result<(), LifecycleError>;
}

/// Called during shutdown, after every OnApplicationShutdown hook
///
/// Services are destroyed in **reverse order** of registration.
#[async_trait]
pub trait OnModuleDestroy: Send + Sync {
    async fn on_module_destroy(&self) -> Result<(), LifecycleError>;
}
