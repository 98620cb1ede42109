//! Lifecycle Hooks Module
//!
//! Startup and shutdown of an [`Application`].
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Module graph scan (DI containers created, imports first)
//!    ↓
//! 2. Route compilation (controllers, guards, interceptors resolved)
//!    ↓
//! 3. OnModuleInit (each service)       ← Lifecycle Hook
//!    ↓
//! 4. OnApplicationBootstrap            ← Lifecycle Hook
//!    ↓
//! 5. Server Start
//!    ↓
//! [Running...]
//!    ↓
//! 6. Shutdown trigger (SIGTERM/SIGINT, request, transport failure)
//!    ↓
//! 7. OnApplicationShutdown             ← Lifecycle Hook
//!    ↓
//! 8. OnModuleDestroy (reverse order)   ← Lifecycle Hook
//!    ↓
//! 9. Transport stop, graph disposal
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis::lifecycle::{OnModuleInit, OnModuleDestroy, LifecycleError};
//! use async_trait::async_trait;
//!
//! #[derive(Injectable)]
//! pub struct DatabaseService {
//!     config: Arc<DatabaseConfig>,
//! }
//!
//! #[async_trait]
//! impl OnModuleInit for DatabaseService {
//!     async fn on_module_init(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Initializing database connection");
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl OnModuleDestroy for DatabaseService {
//!     async fn on_module_destroy(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing database connections");
//!         Ok(())
//!     }
//! }
//! ```

mod application;
mod error;
mod manager;
mod shutdown;
mod traits;

pub use application::{Application, ApplicationBuilder};
pub use error::{LifecycleError, Phase, Result};
pub use manager::LifecycleManager;
pub use shutdown::{
    ExitStatus, ShutdownHandle, ShutdownOrchestrator, ShutdownReason, ShutdownState,
    shutdown_signal,
};
pub use traits::{OnApplicationBootstrap, OnApplicationShutdown, OnModuleDestroy, OnModuleInit};
