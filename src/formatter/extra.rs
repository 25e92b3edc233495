//! Line formatter that appends the record's extras.
//!
//! `extra_fmt` is a percent-style string. A positional `%s` receives every
//! extra as one object; named directives pick single extras and fall back to
//! `extra_default` for the ones a record does not carry. Nothing is appended
//! for records without extras.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};
use crate::formatter::text::{TextFormatter, TextFormatterConfig};
use crate::formatter::{append_traces, Format};
use crate::record::log_record::{is_standard_attribute, LogRecord};
use crate::record::missing::DictIgnoreMissing;
use crate::record::value::AttrValue;
use crate::style::PercentFormat;

/// Configuration for [`ExtraFormatter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraFormatterConfig {
    #[serde(flatten)]
    pub text: TextFormatterConfig,
    pub extra_fmt: Option<String>,
    pub extra_default: Value,
    /// Render the whole-extras object indented over several lines.
    pub extra_pretty_print: bool,
}

impl Default for ExtraFormatterConfig {
    fn default() -> Self {
        Self {
            text: TextFormatterConfig::default(),
            extra_fmt: None,
            extra_default: Value::String(String::new()),
            extra_pretty_print: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtraFormatter {
    text: TextFormatter,
    extra_fmt: Option<PercentFormat>,
    extra_default: AttrValue,
    pretty: bool,
    fmt_keys: HashSet<String>,
}

impl ExtraFormatter {
    pub fn new(config: ExtraFormatterConfig) -> Result<Self> {
        let text = TextFormatter::new(config.text)?;
        let extra_fmt = config
            .extra_fmt
            .as_deref()
            .filter(|fmt| !fmt.is_empty())
            .map(PercentFormat::parse)
            .transpose()?;
        if config.extra_pretty_print && extra_fmt.as_ref().is_some_and(PercentFormat::has_named) {
            return Err(FormatterError::PrettyPrintNamedPlaceholder);
        }
        let fmt_keys = text
            .line_format()
            .keys()
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(Self {
            text,
            extra_fmt,
            extra_default: AttrValue::Json(config.extra_default),
            pretty: config.extra_pretty_print,
            fmt_keys,
        })
    }

    /// Extras not already shown by the line format, in record order.
    fn extras(&self, record: &LogRecord) -> Vec<(String, AttrValue)> {
        record
            .extras()
            .iter()
            .filter(|(key, _)| !is_standard_attribute(key) && !self.fmt_keys.contains(key))
            .cloned()
            .collect()
    }

    fn render_extras(&self, fmt: &PercentFormat, extras: Vec<(String, AttrValue)>) -> Result<String> {
        if fmt.has_named() {
            return fmt.render_mapping(|key| {
                Ok(extras
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| self.extra_default.clone()))
            });
        }

        let object: Map<String, Value> = extras
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    AttrValue::Json(v) => v,
                    AttrValue::Opaque(o) => Value::String(o.to_string()),
                };
                (key, value)
            })
            .collect();
        let text = if self.pretty {
            serde_json::to_string_pretty(&object).map_err(|err| FormatterError::Encode(err.into()))?
        } else {
            Value::Object(object).to_string()
        };
        fmt.render_positional(&[AttrValue::from(text)])
    }

    /// Lookup source with the configured default, for callers that want to
    /// render `extra_fmt` against an arbitrary mapping.
    pub fn extras_with_default(&self, record: &LogRecord) -> DictIgnoreMissing {
        DictIgnoreMissing::new(self.extras(record), self.extra_default.clone())
    }
}

impl Format for ExtraFormatter {
    fn format(&self, record: &LogRecord) -> Result<String> {
        let view = self.text.prepare(record)?;
        let mut line = self.text.format_message(&view)?;
        if let Some(fmt) = &self.extra_fmt {
            let extras = self.extras(record);
            if !extras.is_empty() {
                line.push_str(&self.render_extras(fmt, extras)?);
            }
        }
        Ok(append_traces(line, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use serde_json::json;

    fn formatter(fmt: &str, extra_fmt: &str) -> ExtraFormatter {
        ExtraFormatter::new(ExtraFormatterConfig {
            text: TextFormatterConfig {
                fmt: Some(fmt.to_string()),
                ..TextFormatterConfig::default()
            },
            extra_fmt: Some(extra_fmt.to_string()),
            ..ExtraFormatterConfig::default()
        })
        .unwrap()
    }

    fn record() -> LogRecord {
        LogRecord::builder("app", Level::INFO, "done")
            .extra("duration", json!(12))
            .extra("user", "ann")
            .build_pristine()
    }

    #[test]
    fn test_all_extras() {
        let f = formatter("%(message)s", " extras=%s");
        assert_eq!(f.format(&record()).unwrap(), r#"done extras={"duration":12,"user":"ann"}"#);
    }

    #[test]
    fn test_extras_in_line_format_skipped() {
        let f = formatter("%(message)s user=%(user)s", " extras=%s");
        assert_eq!(f.format(&record()).unwrap(), r#"done user=ann extras={"duration":12}"#);
    }

    #[test]
    fn test_named_extras_with_default() {
        let f = ExtraFormatter::new(ExtraFormatterConfig {
            text: TextFormatterConfig {
                fmt: Some("%(message)s".to_string()),
                ..TextFormatterConfig::default()
            },
            extra_fmt: Some(" [%(user)s:%(request_id)s]".to_string()),
            extra_default: json!("-"),
            ..ExtraFormatterConfig::default()
        })
        .unwrap();
        assert_eq!(f.format(&record()).unwrap(), "done [ann:-]");
    }

    #[test]
    fn test_no_extras_appends_nothing() {
        let f = formatter("%(message)s", " extras=%s");
        let record = LogRecord::builder("app", Level::INFO, "plain").build_pristine();
        assert_eq!(f.format(&record).unwrap(), "plain");
    }

    #[test]
    fn test_pretty_print() {
        let f = ExtraFormatter::new(ExtraFormatterConfig {
            text: TextFormatterConfig {
                fmt: Some("%(message)s".to_string()),
                ..TextFormatterConfig::default()
            },
            extra_fmt: Some("\n%s".to_string()),
            extra_pretty_print: true,
            ..ExtraFormatterConfig::default()
        })
        .unwrap();
        assert_eq!(
            f.format(&record()).unwrap(),
            "done\n{\n  \"duration\": 12,\n  \"user\": \"ann\"\n}"
        );
    }

    #[test]
    fn test_pretty_print_with_named_placeholder_rejected() {
        let err = ExtraFormatter::new(ExtraFormatterConfig {
            extra_fmt: Some("%(user)s".to_string()),
            extra_pretty_print: true,
            ..ExtraFormatterConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, FormatterError::PrettyPrintNamedPlaceholder));
    }

    #[test]
    fn test_extras_with_default_source() {
        let f = formatter("%(message)s", "%s");
        let source = f.extras_with_default(&record());
        assert_eq!(source.get("user"), AttrValue::from("ann"));
        assert_eq!(source.get("absent"), AttrValue::from(""));
    }
}
