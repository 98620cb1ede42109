use crate::http::{HttpRequest, ResponseHandle};
use crate::metadata::TypeKey;
use axum::http::Method;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Static description of a compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    /// Full path template, global prefix and controller path included.
    pub path: String,
    pub controller: TypeKey,
    pub member: String,
}

/// What guards, interceptors and handlers see of the current request.
///
/// Cheap to clone; every clone refers to the same request and response.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    request_id: Uuid,
    request: Arc<HttpRequest>,
    response: ResponseHandle,
    route: Option<Arc<RouteInfo>>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub(crate) fn new(
        request_id: Uuid,
        request: Arc<HttpRequest>,
        response: ResponseHandle,
        route: Option<Arc<RouteInfo>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id,
                request,
                response,
                route,
                cancellation,
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    pub fn request(&self) -> &Arc<HttpRequest> {
        &self.inner.request
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.inner.response
    }

    /// Matched route; `None` while global interceptors run ahead of matching.
    pub fn route(&self) -> Option<&RouteInfo> {
        self.inner.route.as_deref()
    }

    /// Cancelled when the client goes away or the server stops waiting.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("request_id", &self.inner.request_id)
            .field("request", &self.inner.request)
            .field("route", &self.inner.route)
            .finish()
    }
}
