//! # Trellis
//!
//! A declarative dispatch core for HTTP services: components declare what
//! they are (controllers, routes, parameter bindings, guards, interceptors,
//! modules, providers) and the framework assembles them into an immutable
//! route table served through axum.
//!
//! ## Features
//!
//! - **Metadata Registry**: explicit, type-keyed declarations instead of
//!   runtime reflection
//! - **Module-scoped DI**: singleton/transient providers, cross-module
//!   resolution, cycle detection
//! - **Compiled routing**: first-declared-wins matching with a regex-free
//!   fast path for plain `:param` routes
//! - **Guards and interceptors**: sequential guards, onion-style
//!   interceptors, global to method level
//! - **Graceful shutdown**: lifecycle hooks, bounded transport close,
//!   cancellable requests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//! use serde_json::json;
//!
//! #[derive(Injectable)]
//! struct ItemsService;
//!
//! #[derive(Injectable)]
//! struct ItemsController {
//!     items: Arc<ItemsService>,
//! }
//!
//! struct AppModule;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = MetadataRegistry::new();
//!     registry
//!         .controller::<ItemsController>("/items")
//!         .route(RouteDef::post("/", "create").body().handler(
//!             |_: Arc<ItemsController>, args: Args, _: ExecutionContext| async move {
//!                 Ok(Reply::Json(json!({ "id": 1, "item": args.value(0) })))
//!             },
//!         ));
//!     registry.module::<AppModule>(
//!         ModuleMetadata::new()
//!             .controller::<ItemsController>()
//!             .provider::<ItemsService>(),
//!     );
//!
//!     let app = Application::builder(registry)
//!         .root_module::<AppModule>()
//!         .build()
//!         .await?;
//!     let status = app.listen().await?;
//!     std::process::exit(status.code());
//! }
//! ```

extern crate self as trellis;

pub mod common;
pub mod config;
pub mod di;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod guard;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod metadata;
pub mod module;
pub mod router;

// Re-export core types
pub use di::{Container, Injectable, Injector};
pub use error::{Result, TrellisError};
pub use lifecycle::{Application, ApplicationBuilder, ExitStatus};
pub use metadata::MetadataRegistry;
pub use module::ModuleGraph;

// Re-export macros
pub use trellis_macro::Injectable;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::common::{ErrorBody, ErrorCode};
    pub use crate::config::{AppConfig, ConfigService};
    pub use crate::di::{Injectable, Injector};
    pub use crate::dispatch::{Args, ExecutionContext, HandlerError, HandlerResult, Reply};
    pub use crate::error::TrellisError;
    pub use crate::exception::{ExceptionFilter, HttpException, HttpExceptionFilter};
    pub use crate::guard::{Guard, GuardRef};
    pub use crate::http::{HttpRequest, HttpResponse, ResponseHandle};
    pub use crate::interceptor::{Interceptor, InterceptorRef, LoggingInterceptor, Next};
    pub use crate::lifecycle::{
        Application, ApplicationBuilder, ExitStatus, LifecycleError, OnApplicationBootstrap,
        OnApplicationShutdown, OnModuleDestroy, OnModuleInit, ShutdownReason,
    };
    pub use crate::metadata::{MetadataRegistry, ModuleMetadata, ParamKind, RouteDef, Scope};
    pub use async_trait::async_trait;
    pub use axum::http::{Method, StatusCode};
    pub use std::sync::Arc;
    pub use trellis_macro::Injectable;
}
