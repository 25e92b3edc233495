//! Copy values from the thread context onto records.

use serde::{Deserialize, Serialize};

use crate::context::thread_context;
use crate::filters::Filter;
use crate::record::log_record::LogRecord;

/// One value to copy: read `context_key` from the thread context and store
/// it on the record as `logger_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMapping {
    pub context_key: String,
    pub logger_key: String,
}

impl ContextMapping {
    pub fn new(context_key: &str, logger_key: &str) -> Self {
        Self {
            context_key: context_key.to_string(),
            logger_key: logger_key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddThreadContextFilter {
    contexts: Vec<ContextMapping>,
}

impl AddThreadContextFilter {
    pub fn new(contexts: Vec<ContextMapping>) -> Self {
        Self { contexts }
    }
}

impl Filter for AddThreadContextFilter {
    fn filter(&self, record: &mut LogRecord) -> bool {
        let context = thread_context();
        for mapping in &self.contexts {
            // Unset and null values are both skipped.
            match context.get(&mapping.context_key) {
                Some(value) if !value.is_null() => record.set_attribute(&mapping.logger_key, value),
                _ => {}
            }
        }
        true
    }
}
