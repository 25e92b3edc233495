//! Schema input forms.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};

/// Output shape used when no schema is configured.
pub fn default_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("levelname".to_string(), Value::from("levelname"));
    schema.insert("name".to_string(), Value::from("name"));
    schema.insert("message".to_string(), Value::from("message"));
    schema
}

/// A schema as configured: JSON text or an already-built tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaInput {
    Text(String),
    Tree(Value),
}

impl SchemaInput {
    /// The schema root object. Key order is the declaration order.
    pub fn into_tree(self) -> Result<Map<String, Value>> {
        let tree = match self {
            SchemaInput::Text(text) => serde_json::from_str::<Value>(&text)?,
            SchemaInput::Tree(tree) => tree,
        };
        match tree {
            Value::Object(map) => Ok(map),
            other => Err(FormatterError::InvalidSchema(format!(
                "schema must be a JSON object, got {}",
                crate::record::value::json_type_name(&other)
            ))),
        }
    }
}

impl Default for SchemaInput {
    fn default() -> Self {
        SchemaInput::Tree(Value::Object(default_schema()))
    }
}

impl From<&str> for SchemaInput {
    fn from(text: &str) -> Self {
        SchemaInput::Text(text.to_string())
    }
}

impl From<String> for SchemaInput {
    fn from(text: String) -> Self {
        SchemaInput::Text(text)
    }
}

impl From<Value> for SchemaInput {
    fn from(tree: Value) -> Self {
        SchemaInput::Tree(tree)
    }
}

impl From<Map<String, Value>> for SchemaInput {
    fn from(tree: Map<String, Value>) -> Self {
        SchemaInput::Tree(Value::Object(tree))
    }
}
