use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Response under construction. Written at most once.
#[derive(Debug, Default)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    sent: bool,
}

impl HttpResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the status used when the response is later written.
    pub fn set_status(&mut self, status: StatusCode) {
        if !self.sent {
            self.status = status;
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Write status, content type and body. Returns `false` if already sent.
    pub fn send(
        &mut self,
        status: StatusCode,
        content_type: &'static str,
        body: impl Into<Bytes>,
    ) -> bool {
        if self.sent {
            return false;
        }
        self.status = status;
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = body.into();
        self.sent = true;
        true
    }

    pub fn send_json<T: Serialize>(&mut self, status: StatusCode, payload: &T) -> bool {
        match serde_json::to_vec(payload) {
            Ok(body) => self.send(status, "application/json", body),
            Err(err) => {
                tracing::error!("Failed to serialize response payload: {}", err);
                self.send(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "")
            }
        }
    }

    /// Body as UTF-8 text, for tests and logging.
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Shared handle to the response of one request.
///
/// Guards, interceptors and handlers of the same request all write through
/// it; it is never shared between requests.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle(Arc<Mutex<HttpResponse>>);

impl ResponseHandle {
    pub fn with<R>(&self, f: impl FnOnce(&mut HttpResponse) -> R) -> R {
        let mut response = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut response)
    }

    pub fn is_sent(&self) -> bool {
        self.with(|response| response.is_sent())
    }

    pub fn send_json<T: Serialize>(&self, status: StatusCode, payload: &T) -> bool {
        self.with(|response| response.send_json(status, payload))
    }

    pub fn send_text(&self, status: StatusCode, body: impl Into<String>) -> bool {
        let body = body.into();
        self.with(|response| response.send(status, "text/plain; charset=utf-8", body))
    }

    /// Move the response out, leaving a fresh one behind.
    pub(crate) fn take(&self) -> HttpResponse {
        self.with(std::mem::take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_only_once() {
        let handle = ResponseHandle::default();
        assert!(handle.send_text(StatusCode::ACCEPTED, "first"));
        assert!(!handle.send_json(StatusCode::OK, &serde_json::json!({ "second": true })));

        let response = handle.take();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.text(), "first");
        assert!(response.is_sent());
    }

    #[test]
    fn test_default_response_is_ok_and_unsent() {
        let response = HttpResponse::default();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.is_sent());
    }
}
