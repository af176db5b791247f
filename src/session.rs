//! Sessions returned by the identity endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Classification record for a visitor.
///
/// Only `blocked` is interpreted; every other field is carried through as
/// the API returned it. A new lookup replaces the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(Map<String, Value>);

impl Session {
    /// Whether the API marked this visitor as blocked.
    ///
    /// Any truthy `blocked` value counts: `true`, a non-zero number, a
    /// non-empty string, an array or an object.
    pub fn is_blocked(&self) -> bool {
        self.0.get("blocked").is_some_and(is_truthy)
    }

    /// Raw field access.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Session {
    fn from(fields: Map<String, Value>) -> Self {
        Session(fields)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
