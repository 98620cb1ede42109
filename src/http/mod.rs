//! Transport-facing request and response objects
//!
//! The raw HTTP primitive (axum/hyper) hands the dispatcher an
//! [`HttpRequest`] and receives an [`HttpResponse`]. Request state produced
//! during dispatch (path params, parsed body) is filled in exactly once
//! through interior cells, so the request can be shared immutably with
//! guards, interceptors and handlers.

mod params;
mod response;

pub use params::{MAX_INLINE_PARAMS, ParamVec, PathParams, QueryParams};
pub use response::{HttpResponse, ResponseHandle};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

pub struct HttpRequest {
    method: Method,
    target: String,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    query: QueryParams,
    params: OnceLock<PathParams>,
    body: OnceLock<Value>,
    raw_body: Mutex<Option<Body>>,
}

impl HttpRequest {
    /// `target` is the request target as received: path plus optional query.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let target = target.into();
        let query = QueryParams::new(split_target(&target).1);
        Self {
            method,
            target,
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            query,
            params: OnceLock::new(),
            body: OnceLock::new(),
            raw_body: Mutex::new(None),
        }
    }

    /// Build from a request handed over by axum; the body stays unread.
    pub fn from_axum(request: axum::extract::Request) -> Self {
        let (parts, body) = request.into_parts();
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let mut request = Self::new(parts.method, target);
        request.headers = parts.headers;
        request.raw_body = Mutex::new(Some(body));
        request
    }

    /// Names are case-insensitive; an invalid name or value is skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Body already parsed by an upstream body-parsing stage.
    pub fn with_json(self, body: Value) -> Self {
        let _ = self.body.set(body);
        self
    }

    /// Unparsed body stream; JSON-decoded by the dispatcher for POST/PUT/PATCH.
    pub fn with_body(self, body: impl Into<Body>) -> Self {
        *self.raw_body.lock().unwrap_or_else(PoisonError::into_inner) = Some(body.into());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path component of the target, without the query.
    pub fn path(&self) -> &str {
        split_target(&self.target).0
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Path parameters bound by the matched route; empty before matching.
    pub fn params(&self) -> &PathParams {
        static EMPTY: OnceLock<PathParams> = OnceLock::new();
        self.params
            .get()
            .unwrap_or_else(|| EMPTY.get_or_init(PathParams::default))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params().get(name)
    }

    /// Structured body, once parsed or supplied upstream.
    pub fn body(&self) -> Option<&Value> {
        self.body.get()
    }

    pub(crate) fn set_params(&self, params: PathParams) {
        let _ = self.params.set(params);
    }

    pub(crate) fn set_body(&self, body: Value) {
        let _ = self.body.set(body);
    }

    pub(crate) fn take_raw_body(&self) -> Option<Body> {
        self.raw_body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn uri(&self) -> Option<Uri> {
        self.target.parse().ok()
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("params", &self.params.get())
            .field("body", &self.body.get())
            .finish_non_exhaustive()
    }
}

/// Split a request target into path and query without building a URL.
pub fn split_target(target: &str) -> (&str, &str) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let path = if path.is_empty() { "/" } else { path };
    (path, query)
}
