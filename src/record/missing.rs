//! Mapping that answers unknown keys with a default.

use serde_json::{Map, Value};

use crate::record::log_record::{AttributeSource, Lookup};
use crate::record::value::AttrValue;

/// Attribute mapping with a per-instance default for absent keys.
#[derive(Debug, Clone)]
pub struct DictIgnoreMissing {
    entries: Vec<(String, AttrValue)>,
    default: AttrValue,
}

impl DictIgnoreMissing {
    pub fn new(entries: Vec<(String, AttrValue)>, default: AttrValue) -> Self {
        Self { entries, default }
    }

    pub fn from_map(map: &Map<String, Value>, default: AttrValue) -> Self {
        let entries = map
            .iter()
            .map(|(k, v)| (k.clone(), AttrValue::Json(v.clone())))
            .collect();
        Self::new(entries, default)
    }

    /// Value for `key`, or the default. Never fails.
    pub fn get(&self, key: &str) -> AttrValue {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn default_value(&self) -> &AttrValue {
        &self.default
    }
}

impl AttributeSource for DictIgnoreMissing {
    fn attribute(&self, name: &str) -> Lookup {
        match self.entries.iter().find(|(k, _)| k == name) {
            Some((_, v)) => Lookup::Found(v.clone()),
            None => Lookup::Missing,
        }
    }

    fn attributes(&self) -> Vec<(String, AttrValue)> {
        self.entries.clone()
    }

    fn missing_default(&self) -> Option<AttrValue> {
        Some(self.default.clone())
    }
}

/// Plain JSON objects are attribute sources without a default.
impl AttributeSource for Map<String, Value> {
    fn attribute(&self, name: &str) -> Lookup {
        match self.get(name) {
            Some(v) => Lookup::Found(AttrValue::Json(v.clone())),
            None => Lookup::Missing,
        }
    }

    fn attributes(&self) -> Vec<(String, AttrValue)> {
        self.iter()
            .map(|(k, v)| (k.clone(), AttrValue::Json(v.clone())))
            .collect()
    }
}
