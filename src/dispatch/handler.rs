use crate::di::Instance;
use crate::dispatch::{Args, ExecutionContext};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A type-erased error raised by a guard, interceptor or handler
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Standard return type for handlers and interceptors
pub type HandlerResult = Result<Reply, HandlerError>;

/// Type-erased route handler: controller instance, bound arguments, context.
pub type HandlerFn =
    Arc<dyn Fn(Instance, Args, ExecutionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// What a handler returns, before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Structured value, serialized as JSON.
    Json(Value),
    /// Written as is.
    Text(String),
    /// Nothing to write.
    Empty,
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn into_body(self) -> Result<Vec<u8>, HandlerError> {
        match self {
            Self::Json(value) => Ok(serde_json::to_vec(&value)?),
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Empty => Ok(Vec::new()),
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}
