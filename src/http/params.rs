use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::{Arc, OnceLock};

/// Number of parameters kept inline before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 4;

/// Name/value pairs; names are shared with the compiled route.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Path parameters bound by the matched route, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(ParamVec);

impl PathParams {
    pub fn new(params: ParamVec) -> Self {
        Self(params)
    }

    /// Last binding wins when a name repeats.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rfind(|(key, _)| key.as_ref() == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_ref(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                .collect(),
        )
    }
}

/// Query string, decoded on first access.
#[derive(Debug, Default)]
pub struct QueryParams {
    raw: Box<str>,
    decoded: OnceLock<Vec<(String, String)>>,
}

impl QueryParams {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.into(),
            decoded: OnceLock::new(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    fn entries(&self) -> &[(String, String)] {
        self.decoded.get_or_init(|| {
            url::form_urlencoded::parse(self.raw.as_bytes())
                .into_owned()
                .collect()
        })
    }

    /// Last occurrence wins for repeated keys.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.raw.is_empty() {
            return None;
        }
        self.entries()
            .iter()
            .rfind(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        for (key, value) in self.entries() {
            object.insert(key.clone(), Value::String(value.clone()));
        }
        Value::Object(object)
    }
}
