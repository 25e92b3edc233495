//! JSON formatter.
//!
//! Each call walks the compiled schema against the record and serializes the
//! result. The formatter holds only configuration, so a single instance can
//! be shared between threads.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::formatter::serialize::{stringify_default, to_json_string, DefaultSerializer, SerializeOptions};
use crate::formatter::{check_datefmt, format_time, Format, RecordView};
use crate::record::factory::ensure_log_record_ignore_missing_factory;
use crate::record::log_record::{is_standard_attribute, LogRecord};
use crate::record::value::Opaque;
use crate::schema::{encode, BuildOptions, RenderContext, Schema, SchemaInput};
use crate::style::Style;

/// Configuration for [`JsonFormatter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFormatterConfig {
    /// Output schema, as JSON text or a tree.
    pub fmt: SchemaInput,
    /// strftime format for `asctime`.
    pub datefmt: Option<String>,
    pub style: Style,
    /// Merge every extra attribute into the output after the schema is
    /// built. An extra replaces a schema key of the same name in place.
    pub add_always_extra: bool,
    /// Attributes set by filters rather than callers; never merged as extras.
    pub filter_attributes: Vec<String>,
    /// Drop `""`, `{}` and `[]` values from the output.
    pub remove_empty: bool,
    /// Resolve missing attributes to defaults instead of failing. Also
    /// installs the process-wide ignore-missing record hook.
    pub ignore_missing: bool,
    #[serde(flatten)]
    pub serialize: SerializeOptions,
}

impl Default for JsonFormatterConfig {
    fn default() -> Self {
        Self {
            fmt: SchemaInput::default(),
            datefmt: None,
            style: Style::Percent,
            add_always_extra: false,
            filter_attributes: Vec::new(),
            remove_empty: false,
            ignore_missing: false,
            serialize: SerializeOptions::default(),
        }
    }
}

/// Renders records as JSON objects shaped by a schema.
#[derive(Clone)]
pub struct JsonFormatter {
    schema: Schema,
    datefmt: Option<String>,
    style: Style,
    add_always_extra: bool,
    filter_attributes: HashSet<String>,
    remove_empty: bool,
    ignore_missing: bool,
    serialize: SerializeOptions,
    default: Option<DefaultSerializer>,
}

impl JsonFormatter {
    pub fn new(config: JsonFormatterConfig) -> Result<Self> {
        check_datefmt(config.datefmt.as_deref())?;
        let schema = Schema::compile(config.fmt, config.style)?;

        if config.ignore_missing {
            ensure_log_record_ignore_missing_factory(Value::String(String::new()));
        }

        // A non-serializable extra must not cost the whole line.
        let default = config.add_always_extra.then(stringify_default);

        log::debug!(
            "JSON_FORMATTER_CREATED style={} always_extra={} remove_empty={} ignore_missing={}",
            config.style,
            config.add_always_extra,
            config.remove_empty,
            config.ignore_missing
        );

        Ok(Self {
            schema,
            datefmt: config.datefmt,
            style: config.style,
            add_always_extra: config.add_always_extra,
            filter_attributes: config.filter_attributes.into_iter().collect(),
            remove_empty: config.remove_empty,
            ignore_missing: config.ignore_missing,
            serialize: config.serialize,
            default,
        })
    }

    /// Use `default` for values that are not natively JSON.
    pub fn with_default_serializer<F>(mut self, default: F) -> Self
    where
        F: Fn(&Opaque) -> Option<Value> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(default));
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn uses_time(&self) -> bool {
        self.schema.uses_time()
    }

    fn is_extra_attribute(&self, name: &str) -> bool {
        !is_standard_attribute(name) && !self.filter_attributes.contains(name)
    }

    /// Build the output object for `record` without serializing it.
    pub fn format_tree(&self, record: &LogRecord) -> Result<Map<String, Value>> {
        record.message()?;
        let asctime = if self.uses_time() {
            Some(format_time(record, self.datefmt.as_deref())?)
        } else {
            None
        };
        let view = RecordView::new(record, asctime);

        let options = BuildOptions {
            remove_empty: self.remove_empty,
            ignore_missing: self.ignore_missing,
            default: self.default.as_ref(),
        };
        let mut tree = self
            .schema
            .build(&RenderContext::new(&view, record.exc_info().is_some()), &options)?;

        if self.add_always_extra {
            for (key, value) in record.extras() {
                if !self.is_extra_attribute(key) {
                    continue;
                }
                tree.insert(key.clone(), encode(value.clone(), options.default)?);
            }
        }

        if let Some(exc_text) = record.exc_text() {
            tree.insert("exc_text".to_string(), Value::from(exc_text));
        }
        if let Some(stack) = record.stack_info() {
            tree.insert("stack_info".to_string(), Value::from(stack));
        }
        Ok(tree)
    }
}

impl Format for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<String> {
        to_json_string(self.format_tree(record)?, &self.serialize)
    }
}

impl fmt::Debug for JsonFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFormatter")
            .field("schema", &self.schema)
            .field("datefmt", &self.datefmt)
            .field("style", &self.style)
            .field("add_always_extra", &self.add_always_extra)
            .field("filter_attributes", &self.filter_attributes)
            .field("remove_empty", &self.remove_empty)
            .field("ignore_missing", &self.ignore_missing)
            .field("serialize", &self.serialize)
            .field("default", &self.default.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatterError;
    use crate::record::{ExcInfo, Level};
    use serde_json::json;

    fn formatter(fmt: Value) -> JsonFormatter {
        JsonFormatter::new(JsonFormatterConfig {
            fmt: SchemaInput::from(fmt),
            ..JsonFormatterConfig::default()
        })
        .unwrap()
    }

    fn record() -> LogRecord {
        LogRecord::builder("my-logger", Level::INFO, "hello %s")
            .arg("world")
            .location("/srv/app/src/main.rs", 7)
            .build_pristine()
    }

    #[test]
    fn test_default_schema() {
        let out = JsonFormatter::new(JsonFormatterConfig::default())
            .unwrap()
            .format(&record())
            .unwrap();
        assert_eq!(out, r#"{"levelname":"INFO","name":"my-logger","message":"hello world"}"#);
    }

    #[test]
    fn test_schema_text_order() {
        let f = JsonFormatter::new(JsonFormatterConfig {
            fmt: SchemaInput::from(r#"{"msg": "message", "line": "lineno", "file": "filename"}"#),
            ..JsonFormatterConfig::default()
        })
        .unwrap();
        assert_eq!(
            f.format(&record()).unwrap(),
            r#"{"msg":"hello world","line":7,"file":"main.rs"}"#
        );
    }

    #[test]
    fn test_invalid_schema_fails_at_construction() {
        let err = JsonFormatter::new(JsonFormatterConfig {
            fmt: SchemaInput::from("[\"levelname\"]"),
            ..JsonFormatterConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, FormatterError::InvalidSchema(_)));
    }

    #[test]
    fn test_asctime_only_when_used() {
        let f = formatter(json!({"time": "%(asctime)s", "level": "levelname"}));
        assert!(f.uses_time());
        let tree = f.format_tree(&record()).unwrap();
        assert!(tree["time"].as_str().unwrap().contains(','));

        let f = formatter(json!({"time": "asctime"}));
        assert!(f.uses_time());
        assert!(f.format_tree(&record()).unwrap()["time"].is_string());
    }

    #[test]
    fn test_datefmt() {
        let f = JsonFormatter::new(JsonFormatterConfig {
            fmt: SchemaInput::from(json!({"time": "asctime"})),
            datefmt: Some("%Y".to_string()),
            ..JsonFormatterConfig::default()
        })
        .unwrap();
        let year = f.format_tree(&record()).unwrap()["time"].as_str().unwrap().to_string();
        assert_eq!(year.len(), 4);
    }

    #[test]
    fn test_exception_and_stack_appended() {
        let f = formatter(json!({"message": "message", "exc": "exc_info"}));
        let record = LogRecord::builder("app", Level::ERROR, "boom")
            .exc_info(ExcInfo::new("ValueError", "bad"))
            .stack_info("Stack (most recent call last):\n  main")
            .build_pristine();
        let tree = f.format_tree(&record).unwrap();
        let keys: Vec<&String> = tree.keys().collect();
        assert_eq!(keys, vec!["message", "exc", "exc_text", "stack_info"]);
        assert_eq!(tree["exc"], json!(true));
        assert_eq!(tree["exc_text"], json!("ValueError: bad"));
    }

    #[test]
    fn test_always_extra_respects_filter_attributes() {
        let f = JsonFormatter::new(JsonFormatterConfig {
            fmt: SchemaInput::from(json!({"message": "message", "user": "user_id"})),
            add_always_extra: true,
            filter_attributes: vec!["isotime".to_string()],
            ..JsonFormatterConfig::default()
        })
        .unwrap();
        let record = LogRecord::builder("app", Level::INFO, "m")
            .extra("user_id", json!(42))
            .extra("isotime", "2024-01-01T00:00:00")
            .extra("peer", Opaque::new(std::net::Ipv4Addr::LOCALHOST))
            .extra("tags", json!(["a"]))
            .build_pristine();
        assert_eq!(
            f.format(&record).unwrap(),
            r#"{"message":"m","user":42,"user_id":42,"peer":"127.0.0.1","tags":["a"]}"#
        );
    }

    #[test]
    fn test_always_extra_replaces_schema_key() {
        let f = JsonFormatter::new(JsonFormatterConfig {
            fmt: SchemaInput::from(json!({"user_id": "%(levelname)s", "message": "message"})),
            add_always_extra: true,
            ..JsonFormatterConfig::default()
        })
        .unwrap();
        let record = LogRecord::builder("app", Level::INFO, "m")
            .extra("user_id", json!(42))
            .build_pristine();
        assert_eq!(f.format(&record).unwrap(), r#"{"user_id":42,"message":"m"}"#);
    }

    #[test]
    fn test_custom_default_serializer() {
        let f = formatter(json!({"peer": "peer"})).with_default_serializer(|value| {
            Some(json!({"type": value.short_type_name(), "text": value.to_string()}))
        });
        let record = LogRecord::builder("app", Level::INFO, "m")
            .extra("peer", Opaque::new(std::net::Ipv4Addr::LOCALHOST))
            .build_pristine();
        assert_eq!(
            f.format(&record).unwrap(),
            r#"{"peer":{"type":"Ipv4Addr","text":"127.0.0.1"}}"#
        );
    }

    #[test]
    fn test_opaque_without_default_fails() {
        let f = formatter(json!({"peer": "peer"}));
        let record = LogRecord::builder("app", Level::INFO, "m")
            .extra("peer", Opaque::new(std::net::Ipv4Addr::LOCALHOST))
            .build_pristine();
        assert!(matches!(f.format(&record), Err(FormatterError::Serialization { .. })));
    }

    #[test]
    fn test_bad_message_args_fail() {
        let f = formatter(json!({"message": "message"}));
        let record = LogRecord::builder("app", Level::INFO, "%d")
            .arg("not a number")
            .build_pristine();
        assert!(matches!(f.format(&record), Err(FormatterError::Format { .. })));
    }

    #[test]
    fn test_config_deserialize() {
        let config: JsonFormatterConfig = serde_json::from_value(json!({
            "fmt": {"lvl": "{levelname}"},
            "style": "{",
            "remove_empty": true,
            "indent": 2
        }))
        .unwrap();
        assert_eq!(config.style, Style::Brace);
        assert!(config.remove_empty);
        assert_eq!(config.serialize.indent, Some(2));
        assert!(!config.add_always_extra);
    }
}
