//! Bridge from the `log` facade.
//!
//! [`init_json_logger`] installs an `env_logger` backend whose output lines
//! are produced by one of this crate's formatters. `RUST_LOG` still selects
//! which records get that far.

use std::io::Write;
use std::sync::Arc;

use env_logger::Builder;
use log::kv::{self, VisitSource};
use serde_json::Value;

use crate::error::Result;
use crate::filters::{apply_filters, Filter};
use crate::formatter::{Format, JsonFormatter, JsonFormatterConfig};
use crate::record::level::Level;
use crate::record::log_record::LogRecord;
use crate::schema::SchemaInput;
use crate::style::Style;

#[derive(Default)]
struct ExtrasVisitor {
    pairs: Vec<(String, Value)>,
}

fn kv_to_json(value: &kv::Value<'_>) -> Value {
    if let Some(b) = value.to_bool() {
        Value::Bool(b)
    } else if let Some(n) = value.to_i64() {
        Value::from(n)
    } else if let Some(n) = value.to_u64() {
        Value::from(n)
    } else if let Some(n) = value.to_f64() {
        Value::from(n)
    } else if let Some(s) = value.to_borrowed_str() {
        Value::from(s)
    } else {
        Value::String(value.to_string())
    }
}

impl<'kvs> VisitSource<'kvs> for ExtrasVisitor {
    fn visit_pair(&mut self, key: kv::Key<'kvs>, value: kv::Value<'kvs>) -> std::result::Result<(), kv::Error> {
        self.pairs.push((key.as_str().to_string(), kv_to_json(&value)));
        Ok(())
    }
}

/// Convert a facade record. The target becomes the logger name and
/// structured key-values become extras. Record hooks run as usual.
pub fn record_from_log(record: &log::Record<'_>) -> LogRecord {
    let message = record.args().to_string();
    let mut builder = LogRecord::builder(record.target(), Level::from(record.level()), &message)
        .location(record.file().unwrap_or_default(), record.line().unwrap_or(0));
    if let Some(module) = record.module_path() {
        builder = builder.func_name(module);
    }

    let mut visitor = ExtrasVisitor::default();
    if let Err(err) = record.key_values().visit(&mut visitor) {
        log::trace!("LOG_KV_VISIT_FAILED target={} error={}", record.target(), err);
    }
    for (key, value) in visitor.pairs {
        builder = builder.extra(&key, value);
    }
    builder.build()
}

/// Run the filters and the formatter on a facade record. `None` means a
/// filter dropped it.
pub fn render_log_record(
    formatter: &dyn Format,
    filters: &[Box<dyn Filter>],
    record: &log::Record<'_>,
) -> Option<Result<String>> {
    let mut record = record_from_log(record);
    if !apply_filters(filters, &mut record) {
        return None;
    }
    Some(formatter.format(&record))
}

fn builder_for<F>(formatter: F, filters: Vec<Box<dyn Filter>>, level: Option<Level>) -> Builder
where
    F: Format + 'static,
{
    let formatter = Arc::new(formatter);
    let filters = Arc::new(filters);
    let mut builder = Builder::new();
    if let Some(level) = level {
        builder.filter_level(level.into());
    }
    builder.parse_default_env();
    builder.format(move |buf, record| match render_log_record(formatter.as_ref(), &filters, record) {
        Some(Ok(line)) => writeln!(buf, "{}", line),
        Some(Err(err)) => {
            // The application call must not fail because a line could not be rendered.
            eprintln!("--- Logging error ---\n{}\nMessage: {:?}", err, record.args().to_string());
            Ok(())
        }
        None => Ok(()),
    });
    builder
}

/// Install `formatter` as the global logger's line renderer.
pub fn init_json_logger<F>(formatter: F, filters: Vec<Box<dyn Filter>>) -> Result<()>
where
    F: Format + 'static,
{
    builder_for(formatter, filters, Some(Level::INFO)).try_init()?;
    log::debug!("LOGGER_INITIALIZED");
    Ok(())
}

/// One-shot process setup with a JSON formatter.
#[derive(Default)]
pub struct BasicConfig {
    /// Threshold; `RUST_LOG` overrides it when set.
    pub level: Option<Level>,
    /// Output schema; `levelname`, `name` and `message` when unset.
    pub format: Option<SchemaInput>,
    pub style: Style,
    pub datefmt: Option<String>,
    pub filters: Vec<Box<dyn Filter>>,
}

impl BasicConfig {
    /// The formatter [`basic_config`] installs.
    pub fn formatter(&self) -> Result<JsonFormatter> {
        JsonFormatter::new(JsonFormatterConfig {
            fmt: self.format.clone().unwrap_or_default(),
            datefmt: self.datefmt.clone(),
            style: self.style,
            ..JsonFormatterConfig::default()
        })
    }
}

pub fn basic_config(config: BasicConfig) -> Result<()> {
    let formatter = config.formatter()?;
    builder_for(formatter, config.filters, Some(config.level.unwrap_or(Level::WARNING))).try_init()?;
    log::debug!("LOGGER_INITIALIZED style={}", config.style);
    Ok(())
}
