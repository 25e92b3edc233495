//! Record filters.
//!
//! A filter runs before formatting with mutable access to the record. It can
//! decorate the record with attributes or drop it by returning `false`.

pub mod attr_type;
pub mod thread_context;

use chrono::{Local, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::record::level::Level;
use crate::record::log_record::LogRecord;

pub use attr_type::AttrTypeFilter;
pub use thread_context::{AddThreadContextFilter, ContextMapping};

pub trait Filter: Send + Sync {
    /// Return `false` to drop the record.
    fn filter(&self, record: &mut LogRecord) -> bool;
}

/// Run `filters` in order; stops at the first one that drops the record.
pub fn apply_filters(filters: &[Box<dyn Filter>], record: &mut LogRecord) -> bool {
    filters.iter().all(|f| f.filter(record))
}

/// Sets fixed attributes on every record.
#[derive(Debug, Clone, Default)]
pub struct ConstAttribute {
    attributes: Map<String, Value>,
}

impl ConstAttribute {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

impl Filter for ConstAttribute {
    fn filter(&self, record: &mut LogRecord) -> bool {
        for (key, value) in &self.attributes {
            record.set_attribute(key, value.clone());
        }
        true
    }
}

/// Drops records below a level, optionally only for loggers whose name
/// starts with a prefix.
#[derive(Debug, Clone)]
pub struct LevelFilter {
    level: Level,
    logger: String,
}

impl LevelFilter {
    /// `level` is a level name or a registered level number; an empty
    /// `logger` applies the threshold to every logger.
    pub fn new(level: &str, logger: &str) -> Result<Self> {
        Ok(Self::with_level(Level::parse(level)?, logger))
    }

    pub fn with_level(level: Level, logger: &str) -> Self {
        Self {
            level,
            logger: logger.to_string(),
        }
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::with_level(Level::DEBUG, "")
    }
}

impl Filter for LevelFilter {
    fn filter(&self, record: &mut LogRecord) -> bool {
        !(record.name().starts_with(&self.logger) && record.level() < self.level)
    }
}

/// Adds ISO 8601 creation time attributes: `isotime` in local time with
/// offset, `utc_isotime` in UTC with a `Z` suffix.
#[derive(Debug, Clone, Copy)]
pub struct TimeAttribute {
    pub isotime: bool,
    pub utc_isotime: bool,
}

impl Default for TimeAttribute {
    fn default() -> Self {
        Self {
            isotime: true,
            utc_isotime: false,
        }
    }
}

impl Filter for TimeAttribute {
    fn filter(&self, record: &mut LogRecord) -> bool {
        let created = record.created();
        if self.isotime {
            let local = created.with_timezone(&Local).to_rfc3339_opts(SecondsFormat::AutoSi, false);
            record.set_attribute("isotime", local);
        }
        if self.utc_isotime {
            let utc = created.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true);
            record.set_attribute("utc_isotime", utc);
        }
        true
    }
}
