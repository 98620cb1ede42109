//! Module scanning and provider resolution across modules.

use axum::body::Body;
use axum::http::Request;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;
use trellis::ModuleGraph;
use trellis::prelude::*;

static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

struct SharedModule;
struct FeatureModule;

/// Singleton declared by `SharedModule`.
struct Counter {
    hits: AtomicUsize,
}

impl Injectable for Counter {
    fn inject(_: &mut Injector<'_>) -> trellis::Result<Self> {
        CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            hits: AtomicUsize::new(0),
        })
    }
}

#[derive(Injectable)]
struct SharedController {
    counter: Arc<Counter>,
}

#[derive(Injectable)]
struct FeatureController {
    counter: Arc<Counter>,
}

fn address(counter: &Arc<Counter>) -> Value {
    json!(Arc::as_ptr(counter) as usize)
}

#[tokio::test]
async fn test_imported_singleton_is_shared_between_modules() {
    let mut registry = MetadataRegistry::new();
    registry
        .controller::<SharedController>("shared")
        .route(RouteDef::get("/", "counter").handler(
            |this: Arc<SharedController>, _: Args, _: ExecutionContext| async move {
                this.counter.hits.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::Json(address(&this.counter)))
            },
        ));
    registry
        .controller::<FeatureController>("feature")
        .route(RouteDef::get("/", "counter").handler(
            |this: Arc<FeatureController>, _: Args, _: ExecutionContext| async move {
                this.counter.hits.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::Json(address(&this.counter)))
            },
        ));
    registry.module::<SharedModule>(
        ModuleMetadata::new()
            .controller::<SharedController>()
            .provider::<Counter>()
            .export::<Counter>(),
    );
    registry.module::<FeatureModule>(
        ModuleMetadata::new()
            .import::<SharedModule>()
            .controller::<FeatureController>(),
    );

    let before = CONSTRUCTED.load(Ordering::SeqCst);
    let app = Application::builder(registry)
        .root_module::<FeatureModule>()
        .build()
        .await
        .unwrap();

    let mut addresses = Vec::new();
    for uri in ["/shared", "/feature"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        addresses.push(serde_json::from_slice::<Value>(&bytes).unwrap());
    }

    let counter = app.get::<Counter>().unwrap();
    assert_eq!(addresses[0], addresses[1]);
    assert_eq!(addresses[0], address(&counter));
    assert_eq!(counter.hits.load(Ordering::SeqCst), 2);
    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst) - before, 1);
}

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

#[derive(Default, Injectable)]
struct Mailer;

#[derive(Injectable)]
struct Scheduler {
    clock: Arc<dyn Clock>,
    mailer: Arc<Mailer>,
    audit: Option<Arc<AuditLog>>,
    label: String,
}

struct AuditLog;

#[test]
fn test_derived_injection_binds_each_field_kind() {
    struct AppModule;

    let mut registry = MetadataRegistry::new();
    registry.module::<AppModule>(
        ModuleMetadata::new()
            .value::<Arc<dyn Clock>>(Arc::new(FixedClock(42)))
            .provider::<Scheduler>(),
    );
    let mut graph = ModuleGraph::new(Arc::new(registry));
    graph.scan::<AppModule>().unwrap();

    let scheduler = graph.resolve::<Scheduler>(None).unwrap();
    assert_eq!(scheduler.clock.now(), 42);
    assert!(scheduler.audit.is_none());
    assert!(scheduler.label.is_empty());

    // Mailer was never registered; it is constructed once and then cached.
    let mailer = graph.resolve::<Mailer>(None).unwrap();
    assert!(Arc::ptr_eq(&mailer, &scheduler.mailer));
}

#[derive(Injectable)]
struct Ticket;

#[test]
fn test_transient_provider_is_never_cached() {
    struct AppModule;

    let mut registry = MetadataRegistry::new();
    registry.injectable::<Ticket>(Scope::Transient);
    registry.module::<AppModule>(ModuleMetadata::new().provider::<Ticket>());
    let mut graph = ModuleGraph::new(Arc::new(registry));
    graph.scan::<AppModule>().unwrap();

    let first = graph.resolve::<Ticket>(None).unwrap();
    let second = graph.resolve::<Ticket>(None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[derive(Injectable)]
struct Orders {
    _billing: Arc<Billing>,
}

#[derive(Injectable)]
struct Billing {
    _orders: Arc<Orders>,
}

#[test]
fn test_provider_cycle_fails_fast() {
    struct AppModule;

    let mut registry = MetadataRegistry::new();
    registry.module::<AppModule>(
        ModuleMetadata::new()
            .provider::<Orders>()
            .provider::<Billing>(),
    );
    let mut graph = ModuleGraph::new(Arc::new(registry));
    graph.scan::<AppModule>().unwrap();

    match graph.resolve::<Orders>(None) {
        Err(TrellisError::CircularDependency { cycle }) => {
            assert_eq!(cycle, "Orders -> Billing -> Orders");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("cycle was not detected"),
    }
}

#[test]
fn test_import_cycle_fails_fast() {
    struct First;
    struct Second;

    let mut registry = MetadataRegistry::new();
    registry.module::<First>(ModuleMetadata::new().import::<Second>());
    registry.module::<Second>(ModuleMetadata::new().import::<First>());
    let mut graph = ModuleGraph::new(Arc::new(registry));

    let err = graph.scan::<First>().unwrap_err();
    assert!(matches!(err, TrellisError::CircularImport { .. }));
}

#[tokio::test]
async fn test_controller_cycle_aborts_build() {
    struct AppModule;

    #[derive(Injectable)]
    struct CheckoutController {
        _orders: Arc<Orders>,
    }

    let mut registry = MetadataRegistry::new();
    registry
        .controller::<CheckoutController>("checkout")
        .route(RouteDef::post("/", "create").handler(
            |_: Arc<CheckoutController>, _: Args, _: ExecutionContext| async {
                Ok(Reply::Empty)
            },
        ));
    registry.module::<AppModule>(ModuleMetadata::new().controller::<CheckoutController>());

    let err = Application::builder(registry)
        .root_module::<AppModule>()
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, TrellisError::CircularDependency { .. }));
}
