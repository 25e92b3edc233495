//! Format-style engine.
//!
//! Three interchangeable interpolation styles, selected by a one-character
//! discriminator: `%` (percent), `{` (brace) and `$` (template). Each can
//! tell whether a string is a format expression for that style and render
//! it against any [`AttributeSource`].

pub mod brace;
mod numeric;
pub mod percent;
pub mod template;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FormatterError, Result};
use crate::record::log_record::AttributeSource;
use crate::record::value::AttrValue;

pub use brace::BraceFormat;
pub use percent::{compose_message, FlattenedAttributes, PercentFormat};
pub use template::TemplateFormat;

/// Interpolation style of format strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Style {
    #[default]
    Percent,
    Brace,
    Template,
}

impl Style {
    pub fn from_discriminator(value: &str) -> Result<Self> {
        match value {
            "%" => Ok(Style::Percent),
            "{" => Ok(Style::Brace),
            "$" => Ok(Style::Template),
            other => Err(FormatterError::UnsupportedStyle(other.to_string())),
        }
    }

    pub fn discriminator(&self) -> &'static str {
        match self {
            Style::Percent => "%",
            Style::Brace => "{",
            Style::Template => "$",
        }
    }

    /// Line format used by text formatters when none is configured.
    pub fn default_format(&self) -> &'static str {
        match self {
            Style::Percent => "%(levelname)s:%(name)s:%(message)s",
            Style::Brace => "{levelname}:{name}:{message}",
            Style::Template => "${levelname}:${name}:${message}",
        }
    }

    /// Whether `expression` is a format expression in this style.
    pub fn validate(&self, expression: &str) -> bool {
        match self {
            Style::Percent => percent::validate(expression),
            Style::Brace => brace::validate(expression),
            Style::Template => template::validate(expression),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

impl FromStr for Style {
    type Err = FormatterError;

    fn from_str(s: &str) -> Result<Self> {
        Style::from_discriminator(s)
    }
}

impl TryFrom<String> for Style {
    type Error = FormatterError;

    fn try_from(value: String) -> Result<Self> {
        Style::from_discriminator(&value)
    }
}

impl From<Style> for String {
    fn from(style: Style) -> Self {
        style.discriminator().to_string()
    }
}

/// A format expression parsed once and rendered per record.
#[derive(Debug, Clone)]
pub enum CompiledStyle {
    Percent(PercentFormat),
    Brace(BraceFormat),
    Template(TemplateFormat),
}

impl CompiledStyle {
    /// Parse `expression` in `style`, failing on malformed input. Used for
    /// line formats, which must be valid.
    pub fn parse(style: Style, expression: &str) -> Result<Self> {
        if !style.validate(expression) {
            return Err(FormatterError::format(
                expression,
                format!("invalid format for '{}' style", style),
            ));
        }
        Ok(match style {
            Style::Percent => CompiledStyle::Percent(PercentFormat::parse(expression)?),
            Style::Brace => CompiledStyle::Brace(BraceFormat::parse(expression)?),
            Style::Template => CompiledStyle::Template(TemplateFormat::parse(expression)?),
        })
    }

    /// Compile `expression` if it is a format expression in `style`.
    ///
    /// A percent expression can validate yet fail to parse (a stray `%`
    /// next to a good directive); it is still kept so rendering reports the
    /// format error instead of the leaf silently becoming a dotted path.
    pub fn compile(style: Style, expression: &str) -> Option<Self> {
        if !style.validate(expression) {
            return None;
        }
        match style {
            Style::Percent => Some(CompiledStyle::Percent(
                PercentFormat::parse(expression).unwrap_or_else(|err| PercentFormat::broken(expression, err)),
            )),
            Style::Brace => BraceFormat::parse(expression).ok().map(CompiledStyle::Brace),
            Style::Template => TemplateFormat::parse(expression).ok().map(CompiledStyle::Template),
        }
    }

    pub fn style(&self) -> Style {
        match self {
            CompiledStyle::Percent(_) => Style::Percent,
            CompiledStyle::Brace(_) => Style::Brace,
            CompiledStyle::Template(_) => Style::Template,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            CompiledStyle::Percent(f) => f.source(),
            CompiledStyle::Brace(f) => f.source(),
            CompiledStyle::Template(f) => f.source(),
        }
    }

    /// Attribute names the expression refers to.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            CompiledStyle::Percent(f) => f.keys(),
            CompiledStyle::Brace(f) => f.keys(),
            CompiledStyle::Template(f) => f.keys(),
        }
    }

    /// Render against `source`. Absent names resolve to `missing` when it is
    /// given and fail otherwise.
    pub fn render(&self, source: &dyn AttributeSource, missing: Option<&AttrValue>) -> Result<String> {
        match self {
            CompiledStyle::Percent(f) => f.render_source(source, missing),
            CompiledStyle::Brace(f) => f.render_source(source, missing),
            CompiledStyle::Template(f) => f.render_source(source, missing),
        }
    }
}
