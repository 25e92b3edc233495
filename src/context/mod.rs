//! Thread-scoped context attached to records.
//!
//! [`thread_context`] is a free-form per-thread store read by
//! [`AddThreadContextFilter`](crate::filters::AddThreadContextFilter).
//! [`set_logging_context`] installs a record hook that copies the calling
//! thread's logging context onto every record as the `context` attribute.

pub mod thread;

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::record::factory::{install_record_hook, is_record_hook_installed, remove_record_hook, HookHandle};
use crate::record::log_record::LogRecord;

pub use thread::ThreadMappingContext;

/// Name of the hook installed by [`set_logging_context`].
pub const LOGGING_CONTEXT_HOOK: &str = "logging_context";

/// Record attribute the logging context is stored under.
pub const CONTEXT_ATTRIBUTE: &str = "context";

struct InstalledContext {
    context: Arc<ThreadMappingContext>,
    hook: Option<HookHandle>,
}

lazy_static! {
    static ref THREAD_CONTEXT: ThreadMappingContext = ThreadMappingContext::new();
    static ref LOGGING_CONTEXT: Mutex<Option<InstalledContext>> = Mutex::new(None);
}

/// Process-wide store of per-thread values.
pub fn thread_context() -> &'static ThreadMappingContext {
    &THREAD_CONTEXT
}

/// Set the calling thread's logging context and make sure records carry it.
///
/// The context store is created on first use and shared by every thread;
/// each thread only ever sees the data it set itself.
pub fn set_logging_context(context: Option<Value>) -> Result<Arc<ThreadMappingContext>> {
    let mut installed = LOGGING_CONTEXT.lock();
    let state = installed.get_or_insert_with(|| InstalledContext {
        context: Arc::new(ThreadMappingContext::new()),
        hook: None,
    });
    state.context.init(context)?;

    // Reinstall if someone reset the hook chain underneath us.
    if !state.hook.is_some_and(is_record_hook_installed) {
        let context = Arc::clone(&state.context);
        state.hook = Some(install_record_hook(
            LOGGING_CONTEXT_HOOK,
            Arc::new(move |record: &mut LogRecord| {
                record.set_attribute(CONTEXT_ATTRIBUTE, Value::Object(context.snapshot()))
            }),
        ));
    }
    Ok(Arc::clone(&state.context))
}

/// The logging context store, if one is set.
pub fn get_logging_context() -> Option<Arc<ThreadMappingContext>> {
    LOGGING_CONTEXT
        .lock()
        .as_ref()
        .map(|state| Arc::clone(&state.context))
}

/// Drop the logging context and its record hook.
pub fn remove_logging_context() {
    if let Some(state) = LOGGING_CONTEXT.lock().take() {
        if let Some(handle) = state.hook {
            remove_record_hook(handle);
        }
        log::debug!("LOGGING_CONTEXT_REMOVED");
    }
}
