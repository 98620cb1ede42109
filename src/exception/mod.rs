use crate::dispatch::HandlerError;
use crate::http::{HttpRequest, HttpResponse};
use axum::http::StatusCode;
use thiserror::Error;

mod http;

pub use http::HttpExceptionFilter;

/// The ExceptionFilter trait
///
/// Receives any error escaping a guard, interceptor or handler, together with
/// the request and the response as it stands, and is solely responsible for
/// the final error status and body. A filter must leave a response that was
/// already sent untouched.
pub trait ExceptionFilter: Send + Sync + 'static {
    fn catch(&self, error: &HandlerError, request: &HttpRequest, response: &mut HttpResponse);
}

/// An error carrying the HTTP status it should produce.
///
/// # Example
/// ```
/// use trellis::prelude::*;
///
/// fn find(id: &str) -> Result<Reply, HandlerError> {
///     Err(HttpException::not_found(format!("Item {id} not found")).into())
/// }
/// ```
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpException {
    pub status: StatusCode,
    pub message: String,
}

impl HttpException {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}
