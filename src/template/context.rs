//! Caller-supplied render context and dotted-path lookup

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Anything placeholders can be resolved against
pub trait ContextLookup {
    /// Resolve a dotted path such as `order.items.0.name`
    fn lookup(&self, path: &str) -> Option<&Value>;
}

/// Placeholder values for one render call.
///
/// Treated strictly as data: values are substituted, never evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderContext(Map<String, Value>);

impl RenderContext {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a context from a JSON value; `null` yields an empty context
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ContextLookup for RenderContext {
    fn lookup(&self, path: &str) -> Option<&Value> {
        let (head, rest) = split_head(path);
        self.0.get(head).and_then(|value| walk(value, rest))
    }
}

/// Split `a.b.c` into (`a`, Some(`b.c`))
pub(crate) fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Descend into objects by key and arrays by numeric index
pub(crate) fn walk<'a>(value: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let Some(path) = path else {
        return Some(value);
    };

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
