use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Schema of a single Parse class, as returned by `GET /schemas/{class}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSchema {
    pub class_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Value>,
}

/// A single field declaration inside a class schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Payload for `POST`/`PUT /schemas/{class}`. Field values follow the Parse
/// wire shape: `{"type": "String"}` to declare a field, `{"__op": "Delete"}`
/// to drop one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUpdate {
    pub class_name: String,
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Value>,
}

impl SchemaUpdate {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
            indexes: None,
        }
    }

    /// Declare a field of the given Parse type (`String`, `Number`, `Date`...).
    pub fn with_field(mut self, name: impl Into<String>, field_type: &str) -> Self {
        self.fields
            .insert(name.into(), json!({ "type": field_type }));
        self
    }

    /// Mark a field for deletion.
    pub fn without_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), json!({ "__op": "Delete" }));
        self
    }

    pub fn with_indexes(mut self, indexes: Value) -> Self {
        self.indexes = Some(indexes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.indexes.is_none()
    }
}

/// One page of objects from `GET /classes/{class}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectsPage {
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
    #[serde(default)]
    pub count: Option<i64>,
}

/// A single sub-request inside a `POST /batch` payload.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub method: String,
    pub path: String,
    pub body: Value,
}

/// Per-object result from a batch write; exactly one side is populated.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub success: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}
