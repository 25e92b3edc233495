//! Error taxonomy.
//!
//! Configuration errors surface when a formatter is constructed; resolution,
//! format and serialization errors surface per record and never leave the
//! formatter in a different state.

use thiserror::Error;

/// Errors produced while configuring or running a formatter.
#[derive(Debug, Error)]
pub enum FormatterError {
    /// The schema is not an object (or is otherwise unusable).
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The schema was supplied as text that is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    SchemaParse(#[from] serde_json::Error),

    /// Style discriminator other than `%`, `{` or `$`.
    #[error("unsupported style {0:?}, must be one of '%', '{{' or '$'")]
    UnsupportedStyle(String),

    /// A referenced attribute (or dotted path segment) is absent from the record.
    #[error("key \"{key}\" not found in log record (path \"{path}\")")]
    MissingKey { key: String, path: String },

    /// A dotted path tried to descend into something that is not a mapping.
    #[error("cannot get dotted key \"{path}\": \"{key}\" is not a record or mapping")]
    NotAMapping { key: String, path: String },

    /// A style directive could not be applied to the value it references.
    #[error("format error in {expression:?}: {reason}")]
    Format { expression: String, reason: String },

    /// A value in the output tree cannot be encoded as JSON.
    #[error("value of type {type_name} is not JSON serializable")]
    Serialization { type_name: String },

    /// Writing the encoded output failed.
    #[error("failed to encode output: {0}")]
    Encode(#[from] std::io::Error),

    /// Unknown level name or number.
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// Data handed to a context store is not a mapping.
    #[error("invalid context: {0}")]
    InvalidContext(String),

    /// Pretty printing of extras combined with named extra directives.
    #[error("cannot use extra pretty print with named placeholders")]
    PrettyPrintNamedPlaceholder,

    /// A global logger was already installed.
    #[error("failed to install logger: {0}")]
    LoggerInit(#[from] log::SetLoggerError),
}

impl FormatterError {
    pub(crate) fn format(expression: &str, reason: impl Into<String>) -> Self {
        FormatterError::Format {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(key: &str, path: &str) -> Self {
        FormatterError::MissingKey {
            key: key.to_string(),
            path: path.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormatterError>;
