//! Dotted path resolution.
//!
//! Resolves paths like "request.path" against record attributes, descending
//! into nested JSON objects. Trailing dots choose the default for a missing
//! value: none gives `""`, one gives `{}`, two give `[]`.

use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};
use crate::record::log_record::{AttributeSource, Lookup};
use crate::record::value::AttrValue;

/// Value a missing dotted path resolves to in ignore-missing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDefault {
    Text,
    Object,
    List,
}

impl PathDefault {
    fn of(path: &str) -> Self {
        if path.ends_with("..") {
            PathDefault::List
        } else if path.ends_with('.') {
            PathDefault::Object
        } else {
            PathDefault::Text
        }
    }

    pub fn value(&self) -> Value {
        match self {
            PathDefault::Text => Value::String(String::new()),
            PathDefault::Object => Value::Object(Map::new()),
            PathDefault::List => Value::Array(Vec::new()),
        }
    }
}

/// A dotted path split once, at schema compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct DottedPath {
    path: String,
    parents: Vec<String>,
    key: String,
    default: PathDefault,
}

impl DottedPath {
    /// Split on the first dot repeatedly. A remainder of `""` or `"."` ends
    /// the walk, so trailing dots only select the default.
    pub fn parse(path: &str) -> Self {
        let mut parents = Vec::new();
        let mut rest = path;
        let key = loop {
            match rest.split_once('.') {
                Some((key, next)) if next.is_empty() || next == "." => break key,
                Some((key, next)) => {
                    parents.push(key.to_string());
                    rest = next;
                }
                None => break rest,
            }
        };
        Self {
            path: path.to_string(),
            parents,
            key: key.to_string(),
            default: PathDefault::of(path),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn default_kind(&self) -> PathDefault {
        self.default
    }

    /// Resolve against `source`. A missing value becomes the path default when
    /// `ignore_missing` is set. Otherwise a top-level miss takes the source's
    /// own missing default, and anything else is a `MissingKey` error.
    pub fn resolve(&self, source: &dyn AttributeSource, ignore_missing: bool) -> Result<AttrValue> {
        let mut current: Option<AttrValue> = None;
        for parent in &self.parents {
            let next = self.lookup(source, current.as_ref(), parent)?;
            current = Some(next.unwrap_or_else(|| AttrValue::Json(Value::Object(Map::new()))));
        }
        match self.lookup(source, current.as_ref(), &self.key)? {
            Some(value) => Ok(value),
            None if ignore_missing => Ok(AttrValue::Json(self.default.value())),
            None => self
                .parents
                .is_empty()
                .then(|| source.missing_default())
                .flatten()
                .ok_or_else(|| FormatterError::missing(&self.key, &self.path)),
        }
    }

    /// Look `key` up on the record (no parent yet) or inside `parent`.
    fn lookup(&self, source: &dyn AttributeSource, parent: Option<&AttrValue>, key: &str) -> Result<Option<AttrValue>> {
        match parent {
            None => Ok(source.attribute(key).found()),
            Some(AttrValue::Json(Value::Object(map))) => Ok(map.get(key).cloned().map(AttrValue::Json)),
            Some(_) => Err(FormatterError::NotAMapping {
                key: key.to_string(),
                path: self.path.clone(),
            }),
        }
    }
}
