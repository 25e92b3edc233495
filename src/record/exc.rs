//! Exception info attached to a record.

use std::error::Error as StdError;

use serde_json::{json, Value};

/// Captured error: its type, its message and the chain of frames that led
/// to it (outermost first).
#[derive(Debug, Clone, PartialEq)]
pub struct ExcInfo {
    pub type_name: String,
    pub value: String,
    pub traceback: Vec<String>,
}

impl ExcInfo {
    pub fn new(type_name: &str, value: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            value: value.to_string(),
            traceback: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: &str) -> Self {
        self.traceback.push(frame.to_string());
        self
    }

    /// Capture a concrete error and its `source()` chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: StdError + 'static,
    {
        let mut info = Self::new(crate::record::value::short_name(std::any::type_name::<E>()), &err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            info.traceback.push(cause.to_string());
            source = cause.source();
        }
        info
    }

    /// Capture an `anyhow::Error`, keeping its context chain as frames.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let mut chain = err.chain();
        let value = chain.next().map(|e| e.to_string()).unwrap_or_default();
        Self {
            type_name: "Error".to_string(),
            value,
            traceback: chain.map(|e| e.to_string()).collect(),
        }
    }

    /// Render the traceback text; the innermost cause is printed last.
    pub fn render(&self) -> String {
        let last = format!("{}: {}", self.type_name, self.value);
        if self.traceback.is_empty() {
            return last;
        }
        let mut lines = vec!["Traceback (most recent call last):".to_string()];
        for frame in self.traceback.iter().rev() {
            lines.push(format!("  {}", frame));
        }
        lines.push(last);
        lines.join("\n")
    }

    pub fn to_json(&self) -> Value {
        json!({
            "type": self.type_name,
            "value": self.value,
            "traceback": self.traceback,
        })
    }
}
