//! Keep or drop attributes by their type.

use std::collections::HashMap;

use serde_json::Value;

use crate::filters::Filter;
use crate::record::log_record::LogRecord;
use crate::record::value::{json_type_name, AttrValue};

/// Filters record attributes by type.
///
/// Each listed key maps to one or more type names. In whitelist mode (the
/// default) an attribute is removed unless its type matches one of them; in
/// blacklist mode it is removed when it does. Keys not listed pass through.
///
/// JSON values answer to `str`, `int`, `float`, `bool`, `list`, `dict` and
/// `null`, with or without a `builtins.` prefix, and booleans also answer to
/// `int`. Opaque values answer to their qualified Rust type name, its last
/// segment, and any names registered with
/// [`Opaque::also_named`](crate::record::Opaque::also_named).
#[derive(Debug, Clone, Default)]
pub struct AttrTypeFilter {
    types: HashMap<String, Vec<String>>,
    is_blacklist: bool,
}

impl AttrTypeFilter {
    pub fn whitelist() -> Self {
        Self::default()
    }

    pub fn blacklist() -> Self {
        Self {
            types: HashMap::new(),
            is_blacklist: true,
        }
    }

    pub fn with<I, S>(mut self, key: &str, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types
            .entry(key.to_string())
            .or_default()
            .extend(types.into_iter().map(Into::into));
        self
    }

    pub fn is_blacklist(&self) -> bool {
        self.is_blacklist
    }
}

fn json_matches(value: &Value, wanted: &str) -> bool {
    let wanted = wanted.strip_prefix("builtins.").unwrap_or(wanted);
    let name = json_type_name(value);
    name == wanted || (name == "bool" && wanted == "int")
}

/// Whether `value` is an instance of the type called `wanted`.
pub fn matches_type(value: &AttrValue, wanted: &str) -> bool {
    match value {
        AttrValue::Json(v) => json_matches(v, wanted),
        AttrValue::Opaque(o) => {
            o.type_name() == wanted
                || o.short_type_name() == wanted
                || o.aliases().iter().any(|alias| alias == wanted)
        }
    }
}

impl Filter for AttrTypeFilter {
    fn filter(&self, record: &mut LogRecord) -> bool {
        for (key, types) in &self.types {
            let Some(value) = record.extra(key) else {
                continue;
            };
            let matched = types.iter().any(|t| matches_type(value, t));
            if matched == self.is_blacklist {
                record.remove_attribute(key);
            }
        }
        true
    }
}
