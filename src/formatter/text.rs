//! Line formatter: one style string rendered against the record.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::formatter::{append_traces, check_datefmt, format_time, Format, RecordView};
use crate::record::log_record::{AttributeSource, LogRecord};
use crate::style::{CompiledStyle, Style};

/// Configuration for [`TextFormatter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFormatterConfig {
    /// Line format; the style's default format when absent.
    pub fmt: Option<String>,
    pub datefmt: Option<String>,
    pub style: Style,
}

/// Renders `fmt` with the record's attributes, then appends exception and
/// stack text on following lines.
///
/// Unknown attributes fail the call unless the record carries a
/// missing-attribute default (see
/// [`set_log_record_ignore_missing_factory`](crate::record::set_log_record_ignore_missing_factory)).
#[derive(Debug, Clone)]
pub struct TextFormatter {
    line: CompiledStyle,
    datefmt: Option<String>,
    uses_time: bool,
}

impl TextFormatter {
    pub fn new(config: TextFormatterConfig) -> Result<Self> {
        check_datefmt(config.datefmt.as_deref())?;
        let fmt = config
            .fmt
            .unwrap_or_else(|| config.style.default_format().to_string());
        let line = CompiledStyle::parse(config.style, &fmt)?;
        let uses_time = line.keys().contains(&"asctime");
        Ok(Self {
            line,
            datefmt: config.datefmt,
            uses_time,
        })
    }

    pub fn line_format(&self) -> &CompiledStyle {
        &self.line
    }

    pub fn uses_time(&self) -> bool {
        self.uses_time
    }

    /// Compose the message and compute `asctime` if the format needs it.
    pub(crate) fn prepare<'a>(&self, record: &'a LogRecord) -> Result<RecordView<'a>> {
        record.message()?;
        let asctime = if self.uses_time {
            Some(format_time(record, self.datefmt.as_deref())?)
        } else {
            None
        };
        Ok(RecordView::new(record, asctime))
    }

    /// The rendered line format alone, without exception or stack text.
    pub(crate) fn format_message(&self, view: &RecordView<'_>) -> Result<String> {
        let missing = view.missing_default();
        self.line.render(view, missing.as_ref())
    }
}

impl Format for TextFormatter {
    fn format(&self, record: &LogRecord) -> Result<String> {
        let view = self.prepare(record)?;
        let line = self.format_message(&view)?;
        Ok(append_traces(line, record))
    }
}
