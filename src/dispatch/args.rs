use crate::http::{HttpRequest, ResponseHandle};
use crate::metadata::{ParamKind, ParamMetadata};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One bound handler argument.
#[derive(Debug, Clone, Default)]
pub enum Arg {
    /// Nothing could be bound.
    #[default]
    Missing,
    Text(String),
    Json(Value),
    Request(Arc<HttpRequest>),
    Response(ResponseHandle),
}

/// Handler arguments, positioned by their declared index.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Arg>);

static MISSING: Arg = Arg::Missing;

impl Args {
    pub fn new(args: Vec<Arg>) -> Self {
        Self(args)
    }

    pub fn get(&self, index: usize) -> &Arg {
        self.0.get(index).unwrap_or(&MISSING)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Arg::Text(text) => Some(text),
            Arg::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.get(index) {
            Arg::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize the argument; text arguments are read as JSON strings.
    pub fn json<T: DeserializeOwned>(&self, index: usize) -> Option<T> {
        match self.get(index) {
            Arg::Json(value) => serde_json::from_value(value.clone()).ok(),
            Arg::Text(text) => serde_json::from_value(Value::String(text.clone())).ok(),
            _ => None,
        }
    }

    pub fn request(&self, index: usize) -> Option<&Arc<HttpRequest>> {
        match self.get(index) {
            Arg::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn response(&self, index: usize) -> Option<&ResponseHandle> {
        match self.get(index) {
            Arg::Response(response) => Some(response),
            _ => None,
        }
    }
}

/// Bind every declared parameter; anything unavailable is [`Arg::Missing`].
pub(crate) fn extract(
    plan: &[ParamMetadata],
    request: &Arc<HttpRequest>,
    response: &ResponseHandle,
) -> Args {
    let Some(size) = plan.iter().map(|param| param.index + 1).max() else {
        return Args::default();
    };
    let mut args = vec![Arg::Missing; size];
    for param in plan {
        args[param.index] = bind(param, request, response);
    }
    Args(args)
}

fn bind(param: &ParamMetadata, request: &Arc<HttpRequest>, response: &ResponseHandle) -> Arg {
    let key = param.key.as_deref();
    match param.kind {
        ParamKind::Path => match key {
            Some(name) => text(request.param(name)),
            None => Arg::Json(request.params().to_value()),
        },
        ParamKind::Query => match key {
            Some(name) => text(request.query().get(name)),
            None => Arg::Json(request.query().to_value()),
        },
        ParamKind::Body => {
            let value = match key {
                Some(field) => request.body().and_then(|body| body.get(field)),
                None => request.body(),
            };
            value.cloned().map_or(Arg::Missing, Arg::Json)
        }
        ParamKind::Headers => match key {
            Some(name) => text(request.header(name)),
            None => Arg::Json(headers_value(request)),
        },
        ParamKind::Request => Arg::Request(Arc::clone(request)),
        ParamKind::Response => Arg::Response(response.clone()),
    }
}

fn text(value: Option<&str>) -> Arg {
    value.map_or(Arg::Missing, |value| Arg::Text(value.to_string()))
}

fn headers_value(request: &HttpRequest) -> Value {
    let mut object = Map::new();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            object.insert(name.as_str().to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(object)
}
