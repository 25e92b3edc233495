//! Formatters: turn one record into one line of output.
//!
//! [`JsonFormatter`] renders a record through a schema into a JSON object;
//! [`TextFormatter`] and [`ExtraFormatter`] render classic text lines.

pub mod extra;
pub mod json;
pub mod serialize;
pub mod text;

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::Local;

use crate::error::{FormatterError, Result};
use crate::record::log_record::{AttributeSource, LogRecord, Lookup};
use crate::record::value::AttrValue;

pub use extra::{ExtraFormatter, ExtraFormatterConfig};
pub use json::{JsonFormatter, JsonFormatterConfig};
pub use serialize::{stringify_default, DefaultSerializer, SerializeOptions};
pub use text::{TextFormatter, TextFormatterConfig};

/// Something that renders a record to a line of text.
pub trait Format: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<String>;
}

/// A record as seen by one format call: the record plus `asctime` when the
/// formatter computed it.
pub struct RecordView<'a> {
    record: &'a LogRecord,
    asctime: Option<String>,
}

impl<'a> RecordView<'a> {
    pub fn new(record: &'a LogRecord, asctime: Option<String>) -> Self {
        Self { record, asctime }
    }

    pub fn record(&self) -> &'a LogRecord {
        self.record
    }
}

impl AttributeSource for RecordView<'_> {
    fn attribute(&self, name: &str) -> Lookup {
        match (&self.asctime, name) {
            (Some(asctime), "asctime") => Lookup::Found(AttrValue::from(asctime.as_str())),
            _ => self.record.attribute(name),
        }
    }

    fn attributes(&self) -> Vec<(String, AttrValue)> {
        let mut attrs = self.record.attributes();
        if let Some(asctime) = &self.asctime {
            attrs.push(("asctime".to_string(), AttrValue::from(asctime.as_str())));
        }
        attrs
    }

    fn missing_default(&self) -> Option<AttrValue> {
        self.record.missing_default()
    }
}

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reject date formats chrono cannot render.
pub(crate) fn check_datefmt(datefmt: Option<&str>) -> Result<()> {
    match datefmt {
        Some(fmt) if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) => {
            Err(FormatterError::format(fmt, "invalid date format"))
        }
        _ => Ok(()),
    }
}

/// Creation time in local time. Without `datefmt` the milliseconds are
/// appended after a comma, e.g. `2024-05-01 12:00:00,042`.
pub(crate) fn format_time(record: &LogRecord, datefmt: Option<&str>) -> Result<String> {
    let created = record.created().with_timezone(&Local);
    let mut out = String::new();
    let written = match datefmt {
        Some(fmt) => write!(out, "{}", created.format(fmt)),
        None => write!(
            out,
            "{},{:03}",
            created.format(DEFAULT_TIME_FORMAT),
            created.timestamp_subsec_millis()
        ),
    };
    written.map_err(|_| FormatterError::format(datefmt.unwrap_or(DEFAULT_TIME_FORMAT), "invalid date format"))?;
    Ok(out)
}

/// Append exception and stack text on their own lines.
pub(crate) fn append_traces(mut line: String, record: &LogRecord) -> String {
    for trace in [record.exc_text(), record.stack_info()].into_iter().flatten() {
        if !line.is_empty() && !line.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(trace);
    }
    line
}
