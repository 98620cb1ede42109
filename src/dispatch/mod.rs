//! Request dispatch
//!
//! One request moves through a fixed sequence of phases:
//!
//! ```text
//! Received -> GlobalInterceptorPhase -> RouteMatched | NotFound
//!          -> GuardPhase -> Forbidden | Allowed
//!          -> ParameterExtraction -> InterceptorPhase(handler) -> ResponseSent
//! ```
//!
//! 404 and 403 are answered here with fixed payloads. Every other failure
//! raised by a guard, interceptor or handler is handed back as an
//! [`Escalation`] for the exception filter.

mod args;
mod context;
mod handler;

pub use args::{Arg, Args};
pub use context::{ExecutionContext, RouteInfo};
pub use handler::{HandlerError, HandlerFn, HandlerResult, Reply};

use crate::common::ErrorBody;
use crate::http::{HttpRequest, HttpResponse, ResponseHandle};
use crate::interceptor::{self, Interceptor, Next};
use crate::router::{CompiledRoute, RouteTable};
use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default cap on buffered request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// The request's cancellation token fired before dispatch completed.
#[derive(Debug, Clone, Copy, Error)]
#[error("Request cancelled")]
pub struct RequestCancelled;

/// A failure escaping dispatch, with everything the exception filter needs.
#[derive(Debug)]
pub struct Escalation {
    pub error: HandlerError,
    pub request: Arc<HttpRequest>,
    /// Response as it stood when the error surfaced; may already be sent.
    pub response: HttpResponse,
}

/// Routes requests through the compiled route table.
///
/// Immutable once built and shared by every in-flight request.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
    global_interceptors: Arc<[Arc<dyn Interceptor>]>,
    body_limit: usize,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self {
            table,
            global_interceptors: Arc::new([]),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Interceptors run ahead of route matching, each with a no-op `next`.
    pub fn with_global_interceptors(mut self, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        self.global_interceptors = interceptors.into();
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub async fn dispatch(
        &self,
        request: HttpRequest,
        cancellation: CancellationToken,
    ) -> Result<HttpResponse, Escalation> {
        let state = DispatchState {
            request_id: Uuid::new_v4(),
            request: Arc::new(request),
            response: ResponseHandle::default(),
            cancellation,
        };

        let outcome = self.run(&state).await;
        match outcome {
            Ok(()) => Ok(state.response.take()),
            Err(error) => Err(Escalation {
                error,
                request: state.request,
                response: state.response.take(),
            }),
        }
    }

    async fn run(&self, state: &DispatchState) -> Result<(), HandlerError> {
        if !self.global_interceptors.is_empty() {
            let context = state.context(None);
            for interceptor in self.global_interceptors.iter() {
                state
                    .cancellable(interceptor.intercept(&context, Next::noop()))
                    .await?;
                if state.response.is_sent() {
                    debug!(request_id = %state.request_id, "Response owned by global interceptor");
                    return Ok(());
                }
            }
        }

        let request = Arc::clone(&state.request);
        let Some((route, params)) = self.table.find(request.method(), request.path()) else {
            debug!(
                request_id = %state.request_id,
                method = %request.method(),
                path = %request.path(),
                "No route matched"
            );
            state
                .response
                .send_json(StatusCode::NOT_FOUND, &ErrorBody::not_found());
            return Ok(());
        };
        request.set_params(params);

        if has_body(request.method()) && request.body().is_none() {
            let body = self.read_body(state).await?;
            request.set_body(body);
        }
        state.check_cancelled()?;

        let context = state.context(Some(Arc::clone(&route.info)));

        for guard in route.guards.iter() {
            if !state.cancellable(guard.can_activate(&context)).await? {
                debug!(
                    request_id = %state.request_id,
                    route = %route.info.path,
                    "Guard denied access"
                );
                state
                    .response
                    .send_json(StatusCode::FORBIDDEN, &ErrorBody::forbidden());
                return Ok(());
            }
        }
        state.check_cancelled()?;

        let args = args::extract(&route.params, &request, &state.response);
        let reply = if route.is_bare() {
            let handler = &route.handler;
            state
                .cancellable(handler(Arc::clone(&route.controller), args, context))
                .await?
        } else {
            let call = invocation(route, args, context.clone());
            let chain = interceptor::chain(&route.interceptors, &context, call);
            state.cancellable(chain.run()).await?
        };

        write_reply(&state.response, reply)
    }

    async fn read_body(&self, state: &DispatchState) -> Result<Value, HandlerError> {
        let Some(raw) = state.request.take_raw_body() else {
            return Ok(empty_object());
        };
        let bytes = tokio::select! {
            biased;
            _ = state.cancellation.cancelled() => return Err(RequestCancelled.into()),
            bytes = axum::body::to_bytes(raw, self.body_limit) => bytes,
        };
        let body = match bytes {
            Ok(bytes) if bytes.is_empty() => empty_object(),
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                debug!(request_id = %state.request_id, error = %e, "Unparseable body, using empty object");
                empty_object()
            }),
            Err(e) => {
                warn!(request_id = %state.request_id, error = %e, "Failed to read request body");
                empty_object()
            }
        };
        Ok(body)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("global_interceptors", &self.global_interceptors.len())
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

struct DispatchState {
    request_id: Uuid,
    request: Arc<HttpRequest>,
    response: ResponseHandle,
    cancellation: CancellationToken,
}

impl DispatchState {
    fn context(&self, route: Option<Arc<RouteInfo>>) -> ExecutionContext {
        ExecutionContext::new(
            self.request_id,
            Arc::clone(&self.request),
            self.response.clone(),
            route,
            self.cancellation.clone(),
        )
    }

    fn check_cancelled(&self) -> Result<(), HandlerError> {
        if self.cancellation.is_cancelled() {
            debug!(request_id = %self.request_id, "Request cancelled between phases");
            return Err(RequestCancelled.into());
        }
        Ok(())
    }

    /// Await `future` unless the request is cancelled first.
    async fn cancellable<T>(
        &self,
        future: impl Future<Output = Result<T, HandlerError>>,
    ) -> Result<T, HandlerError> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(RequestCancelled.into()),
            result = future => result,
        }
    }
}

fn invocation(route: &CompiledRoute, args: Args, context: ExecutionContext) -> Next {
    let handler = Arc::clone(&route.handler);
    let controller = Arc::clone(&route.controller);
    Next::new(move || handler(controller, args, context))
}

fn write_reply(response: &ResponseHandle, reply: Reply) -> Result<(), HandlerError> {
    if response.is_sent() {
        return Ok(());
    }
    let body = reply.into_body()?;
    response.with(|response| {
        let status = response.status();
        response.send(status, "application/json", body);
    });
    Ok(())
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Injectable, Injector};
    use crate::guard::{Guard, GuardRef};
    use crate::interceptor::InterceptorRef;
    use crate::metadata::{MetadataRegistry, ModuleMetadata, RouteDef};
    use crate::module::ModuleGraph;
    use crate::router::RouteCompiler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    struct AppModule;

    #[derive(Default)]
    struct ItemsController {
        calls: AtomicUsize,
    }

    impl Injectable for ItemsController {
        fn inject(_: &mut Injector<'_>) -> crate::Result<Self> {
            Ok(Self::default())
        }
    }

    struct Allow(bool, Log, &'static str);

    #[async_trait]
    impl Guard for Allow {
        async fn can_activate(&self, _: &ExecutionContext) -> Result<bool, HandlerError> {
            self.1.lock().unwrap().push(self.2.to_string());
            Ok(self.0)
        }
    }

    struct Trace(Log, &'static str);

    #[async_trait]
    impl Interceptor for Trace {
        async fn intercept(&self, context: &ExecutionContext, next: Next) -> HandlerResult {
            if context.route().is_none() {
                return next.run().await;
            }
            self.0.lock().unwrap().push(format!("{} before", self.1));
            let reply = next.run().await;
            self.0.lock().unwrap().push(format!("{} after", self.1));
            reply
        }
    }

    fn dispatcher(build: impl FnOnce(&mut MetadataRegistry)) -> Dispatcher {
        let mut registry = MetadataRegistry::new();
        registry.module::<AppModule>(ModuleMetadata::new().controller::<ItemsController>());
        build(&mut registry);
        let mut graph = ModuleGraph::new(Arc::new(registry));
        graph.scan::<AppModule>().unwrap();
        let table = RouteCompiler::new(&graph).compile().unwrap();
        Dispatcher::new(Arc::new(table))
    }

    async fn send(dispatcher: &Dispatcher, request: HttpRequest) -> HttpResponse {
        dispatcher
            .dispatch(request, CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_body_bound_and_serialized() {
        let dispatcher = dispatcher(|registry| {
            registry.controller::<ItemsController>("items").route(
                RouteDef::post("/", "create").body().handler(
                    |_: Arc<ItemsController>, args: Args, _| async move {
                        let mut item = json!({ "id": 1 });
                        if let (Some(item), Some(Value::Object(body))) =
                            (item.as_object_mut(), args.value(0))
                        {
                            item.extend(body.clone());
                        }
                        Ok(Reply::Json(item))
                    },
                ),
            );
        });

        let request = HttpRequest::new(Method::POST, "/items").with_json(json!({ "name": "pen" }));
        let response = send(&dispatcher, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(response.json(), Some(json!({ "id": 1, "name": "pen" })));
    }

    #[tokio::test]
    async fn test_raw_body_is_parsed_or_replaced_by_empty_object() {
        let dispatcher = dispatcher(|registry| {
            registry.controller::<ItemsController>("items").route(
                RouteDef::put("/:id", "replace").body().handler(
                    |_: Arc<ItemsController>, args: Args, _| async move {
                        Ok(Reply::Json(args.value(0).cloned().unwrap_or(Value::Null)))
                    },
                ),
            );
        });

        let valid = HttpRequest::new(Method::PUT, "/items/1").with_body(r#"{"qty":3}"#);
        assert_eq!(send(&dispatcher, valid).await.json(), Some(json!({ "qty": 3 })));

        let broken = HttpRequest::new(Method::PUT, "/items/1").with_body("{not json");
        assert_eq!(send(&dispatcher, broken).await.json(), Some(json!({})));

        let empty = HttpRequest::new(Method::PUT, "/items/1");
        assert_eq!(send(&dispatcher, empty).await.json(), Some(json!({})));
    }

    #[tokio::test]
    async fn test_unmatched_route_is_404() {
        let dispatcher = dispatcher(|registry| {
            registry
                .controller::<ItemsController>("items")
                .route(RouteDef::get("/", "list").handler(|_: Arc<ItemsController>, _, _| async {
                    Ok(Reply::Json(json!([])))
                }));
        });

        let missing = send(&dispatcher, HttpRequest::new(Method::GET, "/missing")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            missing.json(),
            Some(serde_json::to_value(ErrorBody::not_found()).unwrap())
        );

        let no_method = send(&dispatcher, HttpRequest::new(Method::DELETE, "/items")).await;
        assert_eq!(no_method.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_first_false_guard_short_circuits() {
        let log: Log = Default::default();
        let (first, second) = (Arc::clone(&log), Arc::clone(&log));
        let dispatcher = dispatcher(move |registry| {
            registry
                .controller::<ItemsController>("admin")
                .guard(GuardRef::instance(Allow(false, first, "first")))
                .route(
                    RouteDef::get("/", "dashboard")
                        .guard(GuardRef::instance(Allow(true, second, "second")))
                        .handler(|controller: Arc<ItemsController>, _, _| async move {
                            controller.calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Reply::Json(json!("secret")))
                        }),
                );
        });

        let response = send(&dispatcher, HttpRequest::new(Method::GET, "/admin")).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.json(),
            Some(serde_json::to_value(ErrorBody::forbidden()).unwrap())
        );
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
        let (route, _) = dispatcher.table().find(&Method::GET, "/admin").unwrap();
        let controller = Arc::clone(&route.controller)
            .downcast::<ItemsController>()
            .unwrap();
        assert_eq!(controller.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interceptors_wrap_like_an_onion() {
        let log: Log = Default::default();
        let (global, class, method, handler_log) = (
            Arc::clone(&log),
            Arc::clone(&log),
            Arc::clone(&log),
            Arc::clone(&log),
        );
        let mut registry = MetadataRegistry::new();
        registry.module::<AppModule>(ModuleMetadata::new().controller::<ItemsController>());
        registry
            .controller::<ItemsController>("items")
            .interceptor(InterceptorRef::instance(Trace(class, "B")))
            .route(
                RouteDef::get("/", "list")
                    .interceptor(InterceptorRef::instance(Trace(method, "C")))
                    .handler(move |_: Arc<ItemsController>, _, _| {
                        let log = Arc::clone(&handler_log);
                        async move {
                            log.lock().unwrap().push("handler".to_string());
                            Ok(Reply::Json(json!([])))
                        }
                    }),
            );
        let mut graph = ModuleGraph::new(Arc::new(registry));
        graph.scan::<AppModule>().unwrap();
        let global: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Trace(global, "A"))];
        let table = RouteCompiler::new(&graph)
            .global_interceptors(global.clone())
            .compile()
            .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(table)).with_global_interceptors(global);

        let response = send(&dispatcher, HttpRequest::new(Method::GET, "/items")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A before", "B before", "C before", "handler", "C after", "B after", "A after"]
        );
    }

    #[tokio::test]
    async fn test_global_interceptor_can_own_the_response() {
        struct Static;

        #[async_trait]
        impl Interceptor for Static {
            async fn intercept(&self, context: &ExecutionContext, next: Next) -> HandlerResult {
                if context.route().is_none() && context.request().path() == "/robots.txt" {
                    context.response().send_text(StatusCode::OK, "User-agent: *");
                }
                next.run().await
            }
        }

        let dispatcher = dispatcher(|_| {}).with_global_interceptors(vec![Arc::new(Static)]);
        let response = send(&dispatcher, HttpRequest::new(Method::GET, "/robots.txt")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "User-agent: *");
    }

    #[tokio::test]
    async fn test_handler_error_escalates() {
        let dispatcher = dispatcher(|registry| {
            registry.controller::<ItemsController>("items").route(
                RouteDef::get("/:id", "find_one").handler(|_: Arc<ItemsController>, _, _| async {
                    Err::<Reply, HandlerError>("boom".into())
                }),
            );
        });

        let escalation = dispatcher
            .dispatch(HttpRequest::new(Method::GET, "/items/4"), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(escalation.error.to_string(), "boom");
        assert_eq!(escalation.request.param("id"), Some("4"));
        assert!(!escalation.response.is_sent());
    }

    #[tokio::test]
    async fn test_handler_writing_itself_is_not_overwritten() {
        let dispatcher = dispatcher(|registry| {
            registry.controller::<ItemsController>("download").route(
                RouteDef::get("/", "file").response().handler(
                    |_: Arc<ItemsController>, args: Args, _| async move {
                        if let Some(response) = args.response(0) {
                            response.send_text(StatusCode::CREATED, "raw bytes");
                        }
                        Ok(Reply::Json(json!({ "ignored": true })))
                    },
                ),
            );
        });

        let response = send(&dispatcher, HttpRequest::new(Method::GET, "/download")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.text(), "raw bytes");
    }

    #[tokio::test]
    async fn test_cancelled_request_escalates() {
        let dispatcher = dispatcher(|registry| {
            registry.controller::<ItemsController>("slow").route(
                RouteDef::get("/", "wait").handler(|_: Arc<ItemsController>, _, _| async {
                    std::future::pending::<()>().await;
                    Ok(Reply::Empty)
                }),
            );
        });

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let escalation = dispatcher
            .dispatch(HttpRequest::new(Method::GET, "/slow"), token)
            .await
            .unwrap_err();
        assert!(escalation.error.is::<RequestCancelled>());
    }
}
