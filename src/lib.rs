//! Logging Utilities - structured JSON formatting for log records
//!
//! This crate renders log records as JSON objects shaped by a user-supplied
//! schema, and enriches records with context on the way. The implementation
//! prioritizes:
//!
//! 1. **Fidelity** - Output keys follow schema order; values keep their JSON types
//! 2. **Isolation** - Formatters hold configuration only and never mutate records
//! 3. **Performance** - Schemas compile once; attribute lookups short-circuit
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `record` - Log record model, levels, exception info, construction hooks
//! - `style` - Percent, brace and template format styles
//! - `schema` - Schema parsing, dotted paths and the output tree builder
//! - `formatter` - JSON, text and extra formatters plus output encoding
//! - `filters` - Record filters (constant/time attributes, level, type, thread context)
//! - `context` - Per-thread context stores
//! - `logging` - Bridge from the `log` facade through `env_logger`
//!
//! ## Example
//!
//! ```
//! use logging_utilities::formatter::{Format, JsonFormatter, JsonFormatterConfig};
//! use logging_utilities::record::{Level, LogRecord};
//! use logging_utilities::schema::SchemaInput;
//! use serde_json::json;
//!
//! let formatter = JsonFormatter::new(JsonFormatterConfig {
//!     fmt: SchemaInput::from(json!({"level": "levelname", "msg": "message"})),
//!     ..JsonFormatterConfig::default()
//! })
//! .unwrap();
//! let record = LogRecord::builder("app", Level::INFO, "hello %s").arg("world").build();
//! assert_eq!(formatter.format(&record).unwrap(), r#"{"level":"INFO","msg":"hello world"}"#);
//! ```

pub mod context;
pub mod error;
pub mod filters;
pub mod formatter;
pub mod logging;
pub mod record;
pub mod schema;
pub mod style;

pub use error::{FormatterError, Result};
pub use formatter::{ExtraFormatter, Format, JsonFormatter, TextFormatter};
pub use record::{Level, LogRecord};
pub use style::Style;
