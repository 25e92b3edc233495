//! Numeric log levels.

use std::borrow::Cow;
use std::fmt;

use crate::error::{FormatterError, Result};

/// Severity of a record, numerically comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub u32);

impl Level {
    pub const NOTSET: Level = Level(0);
    pub const TRACE: Level = Level(5);
    pub const DEBUG: Level = Level(10);
    pub const INFO: Level = Level(20);
    pub const WARNING: Level = Level(30);
    pub const ERROR: Level = Level(40);
    pub const CRITICAL: Level = Level(50);

    const NAMES: [(&'static str, Level); 7] = [
        ("CRITICAL", Level::CRITICAL),
        ("ERROR", Level::ERROR),
        ("WARNING", Level::WARNING),
        ("INFO", Level::INFO),
        ("DEBUG", Level::DEBUG),
        ("TRACE", Level::TRACE),
        ("NOTSET", Level::NOTSET),
    ];

    pub fn levelno(&self) -> u32 {
        self.0
    }

    /// Level name; numbers without a registered name render as `Level <n>`.
    pub fn name(&self) -> Cow<'static, str> {
        Self::NAMES
            .iter()
            .find(|(_, level)| level == self)
            .map(|(name, _)| Cow::Borrowed(*name))
            .unwrap_or_else(|| Cow::Owned(format!("Level {}", self.0)))
    }

    pub fn from_name(name: &str) -> Option<Level> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "WARN" => Some(Level::WARNING),
            "FATAL" => Some(Level::CRITICAL),
            _ => Self::NAMES
                .iter()
                .find(|(n, _)| *n == upper)
                .map(|(_, level)| *level),
        }
    }

    /// Parse a level given either by name or by a registered number.
    pub fn parse(value: &str) -> Result<Level> {
        if let Ok(number) = value.trim().parse::<u32>() {
            let level = Level(number);
            if Self::NAMES.iter().any(|(_, l)| *l == level) {
                return Ok(level);
            }
            return Err(FormatterError::InvalidLevel(format!(
                "undefined level integer {}",
                number
            )));
        }
        Self::from_name(value.trim())
            .ok_or_else(|| FormatterError::InvalidLevel(format!("unsupported level string {:?}", value)))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::ERROR,
            log::Level::Warn => Level::WARNING,
            log::Level::Info => Level::INFO,
            log::Level::Debug => Level::DEBUG,
            log::Level::Trace => Level::TRACE,
        }
    }
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        match level.0 {
            0 => log::LevelFilter::Trace,
            1..=5 => log::LevelFilter::Trace,
            6..=10 => log::LevelFilter::Debug,
            11..=20 => log::LevelFilter::Info,
            21..=30 => log::LevelFilter::Warn,
            _ => log::LevelFilter::Error,
        }
    }
}
