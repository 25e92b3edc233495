//! The log record: standard fields plus caller-supplied extras.
//!
//! Standard fields are fixed once the record is built. Extras can still be
//! added or removed by filters, which hold `&mut LogRecord`; formatters only
//! ever see `&LogRecord`, so nothing changes once formatting starts.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};
use crate::record::exc::ExcInfo;
use crate::record::factory::apply_record_hooks;
use crate::record::level::Level;
use crate::record::value::AttrValue;
use crate::style::percent::compose_message;

/// Attribute names every record carries (or gains while being formatted).
/// Anything else on a record is an extra.
pub const STANDARD_ATTRIBUTES: [&str; 23] = [
    "name",
    "msg",
    "args",
    "levelname",
    "levelno",
    "pathname",
    "filename",
    "module",
    "exc_info",
    "exc_text",
    "stack_info",
    "lineno",
    "funcName",
    "created",
    "msecs",
    "relativeCreated",
    "thread",
    "threadName",
    "processName",
    "process",
    "taskName",
    "message",
    "asctime",
];

pub fn is_standard_attribute(name: &str) -> bool {
    STANDARD_ATTRIBUTES.contains(&name)
}

lazy_static! {
    static ref START_TIME: DateTime<Utc> = Utc::now();
    static ref PROCESS_NAME: String = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "MainProcess".to_string());
}

static NEXT_THREAD_IDENT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_IDENT: u64 = NEXT_THREAD_IDENT.fetch_add(1, Ordering::Relaxed);
}

/// Result of an attribute lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(AttrValue),
    Missing,
}

impl Lookup {
    pub fn found(self) -> Option<AttrValue> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Missing => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Anything attributes can be looked up on by name.
pub trait AttributeSource {
    fn attribute(&self, name: &str) -> Lookup;

    /// Every attribute currently set, standard fields first.
    fn attributes(&self) -> Vec<(String, AttrValue)>;

    /// Value substituted for absent names, if this source tolerates misses.
    fn missing_default(&self) -> Option<AttrValue> {
        None
    }
}

/// One log event.
#[derive(Debug)]
pub struct LogRecord {
    name: String,
    level: Level,
    msg: String,
    args: Vec<Value>,
    pathname: String,
    lineno: u32,
    func_name: Option<String>,
    created: DateTime<Utc>,
    thread: u64,
    thread_name: Option<String>,
    process: u32,
    exc_info: Option<ExcInfo>,
    exc_text: OnceLock<String>,
    stack_info: Option<String>,
    message: OnceLock<String>,
    extras: Vec<(String, AttrValue)>,
    missing_default: Option<AttrValue>,
}

impl LogRecord {
    pub fn builder(name: &str, level: Level, msg: &str) -> RecordBuilder {
        RecordBuilder::new(name, level, msg)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    pub fn filename(&self) -> String {
        Path::new(&self.pathname)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.pathname.clone())
    }

    pub fn module(&self) -> String {
        Path::new(&self.pathname)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown module".to_string())
    }

    pub fn lineno(&self) -> u32 {
        self.lineno
    }

    pub fn func_name(&self) -> Option<&str> {
        self.func_name.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn exc_info(&self) -> Option<&ExcInfo> {
        self.exc_info.as_ref()
    }

    pub fn stack_info(&self) -> Option<&str> {
        self.stack_info.as_deref()
    }

    pub fn thread(&self) -> u64 {
        self.thread
    }

    pub fn process(&self) -> u32 {
        self.process
    }

    /// The composed message, computed on first use and cached.
    pub fn message(&self) -> Result<&str> {
        if let Some(message) = self.message.get() {
            return Ok(message);
        }
        let composed = compose_message(&self.msg, &self.args)?;
        Ok(self.message.get_or_init(|| composed))
    }

    /// Rendered exception text, computed at most once per record.
    pub fn exc_text(&self) -> Option<&str> {
        let info = self.exc_info.as_ref()?;
        Some(self.exc_text.get_or_init(|| info.render()).as_str())
    }

    pub fn extras(&self) -> &[(String, AttrValue)] {
        &self.extras
    }

    pub fn extra(&self, name: &str) -> Option<&AttrValue> {
        self.extras.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Add or replace an extra attribute. Standard fields are not affected:
    /// an extra sharing a standard name stays inspectable through
    /// [`LogRecord::extra`] but lookups keep returning the standard field.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttrValue>) {
        let value = value.into();
        match self.extras.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.extras.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttrValue> {
        let index = self.extras.iter().position(|(k, _)| k == name)?;
        Some(self.extras.remove(index).1)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_found()
    }

    /// Opt this record into returning `default` for unknown attributes.
    pub fn set_missing_default(&mut self, default: Option<AttrValue>) {
        self.missing_default = default;
    }

    /// Attribute lookup honouring the record's missing-attribute default.
    pub fn get_or_default(&self, name: &str) -> Result<AttrValue> {
        match self.attribute(name) {
            Lookup::Found(v) => Ok(v),
            Lookup::Missing => self
                .missing_default
                .clone()
                .ok_or_else(|| FormatterError::missing(name, name)),
        }
    }

    fn msecs(&self) -> f64 {
        f64::from(self.created.timestamp_subsec_millis())
    }

    fn created_secs(&self) -> f64 {
        self.created.timestamp_micros() as f64 / 1_000_000.0
    }

    fn relative_created(&self) -> f64 {
        (self.created - *START_TIME).num_microseconds().unwrap_or(0) as f64 / 1000.0
    }

    fn standard_attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "name" => Value::from(self.name.as_str()),
            "msg" => Value::from(self.msg.as_str()),
            "args" => Value::Array(self.args.clone()),
            "levelname" => Value::from(self.level.name().into_owned()),
            "levelno" => Value::from(self.level.levelno()),
            "pathname" => Value::from(self.pathname.as_str()),
            "filename" => Value::from(self.filename()),
            "module" => Value::from(self.module()),
            "exc_info" => self.exc_info.as_ref().map(ExcInfo::to_json).unwrap_or(Value::Null),
            "exc_text" => self.exc_text().map(Value::from).unwrap_or(Value::Null),
            "stack_info" => self.stack_info.as_deref().map(Value::from).unwrap_or(Value::Null),
            "lineno" => Value::from(self.lineno),
            "funcName" => self.func_name.as_deref().map(Value::from).unwrap_or(Value::Null),
            "created" => Value::from(self.created_secs()),
            "msecs" => Value::from(self.msecs()),
            "relativeCreated" => Value::from(self.relative_created()),
            "thread" => Value::from(self.thread),
            "threadName" => Value::from(self.thread_name.as_deref().unwrap_or("MainThread")),
            "processName" => Value::from(PROCESS_NAME.as_str()),
            "process" => Value::from(self.process),
            "taskName" => Value::Null,
            "message" => Value::from(self.message().ok()?),
            _ => return None,
        };
        Some(value)
    }
}

impl AttributeSource for LogRecord {
    fn attribute(&self, name: &str) -> Lookup {
        if let Some(value) = self.standard_attribute(name) {
            return Lookup::Found(AttrValue::Json(value));
        }
        match self.extra(name) {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::Missing,
        }
    }

    fn attributes(&self) -> Vec<(String, AttrValue)> {
        let mut attrs: Vec<(String, AttrValue)> = STANDARD_ATTRIBUTES
            .iter()
            .filter_map(|name| {
                self.standard_attribute(name)
                    .map(|v| (name.to_string(), AttrValue::Json(v)))
            })
            .collect();
        for (key, value) in &self.extras {
            if !is_standard_attribute(key) {
                attrs.push((key.clone(), value.clone()));
            }
        }
        attrs
    }

    fn missing_default(&self) -> Option<AttrValue> {
        self.missing_default.clone()
    }
}

/// Builds a [`LogRecord`]; `build` runs the process-wide record hooks.
#[derive(Debug)]
pub struct RecordBuilder {
    record: LogRecord,
}

impl RecordBuilder {
    pub fn new(name: &str, level: Level, msg: &str) -> Self {
        let current = std::thread::current();
        Self {
            record: LogRecord {
                name: name.to_string(),
                level,
                msg: msg.to_string(),
                args: Vec::new(),
                pathname: String::new(),
                lineno: 0,
                func_name: None,
                created: Utc::now(),
                thread: THREAD_IDENT.with(|id| *id),
                thread_name: current.name().map(|s| s.to_string()),
                process: std::process::id(),
                exc_info: None,
                exc_text: OnceLock::new(),
                stack_info: None,
                message: OnceLock::new(),
                extras: Vec::new(),
                missing_default: None,
            },
        }
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.record.args = args;
        self
    }

    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.record.args.push(arg.into());
        self
    }

    pub fn location(mut self, pathname: &str, lineno: u32) -> Self {
        self.record.pathname = pathname.to_string();
        self.record.lineno = lineno;
        self
    }

    pub fn func_name(mut self, func_name: &str) -> Self {
        self.record.func_name = Some(func_name.to_string());
        self
    }

    pub fn created(mut self, created: DateTime<Utc>) -> Self {
        self.record.created = created;
        self
    }

    pub fn extra(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.record.set_attribute(key, value);
        self
    }

    /// Merge every key of a JSON object as an extra.
    pub fn extras(mut self, extras: Map<String, Value>) -> Self {
        for (key, value) in extras {
            self.record.set_attribute(&key, value);
        }
        self
    }

    pub fn exc_info(mut self, info: ExcInfo) -> Self {
        self.record.exc_info = Some(info);
        self
    }

    pub fn stack_info(mut self, stack: &str) -> Self {
        self.record.stack_info = Some(stack.to_string());
        self
    }

    /// Capture the current call stack as the record's stack text.
    pub fn capture_stack(mut self) -> Self {
        let backtrace = std::backtrace::Backtrace::force_capture();
        self.record.stack_info = Some(format!("Stack (most recent call last):\n{}", backtrace));
        self
    }

    /// Return `default` instead of failing for unknown attributes on this
    /// record, independent of any installed hook.
    pub fn ignore_missing(mut self, default: impl Into<AttrValue>) -> Self {
        self.record.missing_default = Some(default.into());
        self
    }

    /// Build without consulting the record hooks.
    pub fn build_pristine(self) -> LogRecord {
        self.record
    }

    /// Build and pass the record through every installed record hook.
    pub fn build(self) -> LogRecord {
        let mut record = self.record;
        apply_record_hooks(&mut record);
        record
    }
}
