//! Process-wide record construction hooks.
//!
//! Every record built through [`RecordBuilder::build`] passes through the
//! installed hooks in installation order. Installing appends to the chain,
//! so independent hooks compose; removing the last hook restores the one
//! installed before it.
//!
//! [`RecordBuilder::build`]: crate::record::RecordBuilder::build

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde_json::Value;

use crate::record::log_record::LogRecord;
use crate::record::value::AttrValue;

/// A record decorator applied at construction time.
pub type RecordHook = Arc<dyn Fn(&mut LogRecord) + Send + Sync>;

/// Name of the hook installed by [`set_log_record_ignore_missing_factory`].
pub const IGNORE_MISSING_HOOK: &str = "ignore_missing";

/// Identifies one installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

struct InstalledHook {
    handle: HookHandle,
    name: String,
    default: Option<Value>,
    hook: RecordHook,
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

// Global hook chain with thread-safe access
lazy_static! {
    static ref RECORD_HOOKS: RwLock<Vec<InstalledHook>> = RwLock::new(Vec::new());
}

fn install(name: &str, default: Option<Value>, hook: RecordHook) -> HookHandle {
    let handle = HookHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
    let mut hooks = RECORD_HOOKS.write();
    hooks.push(InstalledHook {
        handle,
        name: name.to_string(),
        default,
        hook,
    });
    log::debug!("RECORD_HOOK_INSTALLED name={} hooks={}", name, hooks.len());
    handle
}

/// Append a hook to the chain.
pub fn install_record_hook(name: &str, hook: RecordHook) -> HookHandle {
    install(name, None, hook)
}

/// Remove one hook; returns `false` if it was not installed.
pub fn remove_record_hook(handle: HookHandle) -> bool {
    let mut hooks = RECORD_HOOKS.write();
    match hooks.iter().position(|h| h.handle == handle) {
        Some(index) => {
            let removed = hooks.remove(index);
            log::debug!(
                "RECORD_HOOK_REMOVED name={} hooks={}",
                removed.name,
                hooks.len()
            );
            true
        }
        None => false,
    }
}

/// Remove the most recently installed hook.
pub fn pop_record_hook() -> Option<HookHandle> {
    let mut hooks = RECORD_HOOKS.write();
    let removed = hooks.pop()?;
    log::debug!("RECORD_HOOK_REMOVED name={} hooks={}", removed.name, hooks.len());
    Some(removed.handle)
}

/// Clear the chain back to plain construction.
pub fn reset_record_hooks() {
    let mut hooks = RECORD_HOOKS.write();
    hooks.clear();
    log::debug!("RECORD_HOOKS_RESET");
}

pub fn is_record_hook_installed(handle: HookHandle) -> bool {
    RECORD_HOOKS.read().iter().any(|h| h.handle == handle)
}

/// Names of the installed hooks, in application order.
pub fn installed_record_hooks() -> Vec<String> {
    RECORD_HOOKS.read().iter().map(|h| h.name.clone()).collect()
}

/// Run every installed hook on a freshly built record.
pub fn apply_record_hooks(record: &mut LogRecord) {
    // Clone the chain so hooks run without holding the lock; a hook may
    // itself build records.
    let hooks: Vec<RecordHook> = RECORD_HOOKS.read().iter().map(|h| Arc::clone(&h.hook)).collect();
    for hook in hooks {
        hook(record);
    }
}

/// Make every record built from now on return `default` for unknown
/// attributes instead of failing.
pub fn set_log_record_ignore_missing_factory(default: Value) -> HookHandle {
    let hook_default = AttrValue::Json(default.clone());
    install(
        IGNORE_MISSING_HOOK,
        Some(default),
        Arc::new(move |record: &mut LogRecord| {
            record.set_missing_default(Some(hook_default.clone()))
        }),
    )
}

/// Install the ignore-missing hook unless the most recent ignore-missing
/// hook already uses the same default.
pub fn ensure_log_record_ignore_missing_factory(default: Value) -> HookHandle {
    {
        let hooks = RECORD_HOOKS.read();
        if let Some(existing) = hooks.iter().rev().find(|h| h.name == IGNORE_MISSING_HOOK) {
            if existing.default.as_ref() == Some(&default) {
                return existing.handle;
            }
        }
    }
    set_log_record_ignore_missing_factory(default)
}

/// Remove every ignore-missing hook; records raise on unknown attributes
/// again. Other hooks stay installed.
pub fn reset_log_record_factory() {
    let mut hooks = RECORD_HOOKS.write();
    hooks.retain(|h| h.name != IGNORE_MISSING_HOOK);
    log::debug!("RECORD_FACTORY_RESET hooks={}", hooks.len());
}


#[cfg(test)]
mod tests {
    use super::test_support::HOOK_TEST_LOCK;
    use super::*;
    use crate::record::level::Level;
    use crate::record::log_record::AttributeSource;
    use serde_json::json;

    fn build() -> LogRecord {
        LogRecord::builder("my-record", Level::INFO, "my message: %s %d")
            .args(vec![json!("test"), json!(2)])
            .extra("my-extra", "this is an extra")
            .build()
    }

    #[test]
    fn test_ignore_missing_default() {
        let _guard = HOOK_TEST_LOCK.lock();
        reset_record_hooks();
        set_log_record_ignore_missing_factory(json!(""));

        let record = build();
        assert_eq!(record.get_or_default("name").unwrap(), AttrValue::from("my-record"));
        assert_eq!(record.message().unwrap(), "my message: test 2");
        assert_eq!(
            record.get_or_default("my-extra").unwrap(),
            AttrValue::from("this is an extra")
        );
        assert_eq!(record.get_or_default("unknown").unwrap(), AttrValue::from(""));
        reset_log_record_factory();
    }

    #[test]
    fn test_ignore_missing_various_defaults() {
        let _guard = HOOK_TEST_LOCK.lock();
        reset_record_hooks();
        for default in [json!(null), json!("my-default"), json!(0), json!({"1": "default"}), json!([1])] {
            set_log_record_ignore_missing_factory(default.clone());
            let record = build();
            assert_eq!(record.get_or_default("unknown").unwrap(), AttrValue::Json(default));
            reset_log_record_factory();
        }
    }

    #[test]
    fn test_reset_restores_raising() {
        let _guard = HOOK_TEST_LOCK.lock();
        reset_record_hooks();
        set_log_record_ignore_missing_factory(json!(""));
        reset_log_record_factory();
        assert!(build().get_or_default("unknown").is_err());
    }

    #[test]
    fn test_hooks_compose() {
        let _guard = HOOK_TEST_LOCK.lock();
        reset_record_hooks();
        install_record_hook(
            "tag",
            Arc::new(|record: &mut LogRecord| record.set_attribute("tag", "a")),
        );
        set_log_record_ignore_missing_factory(json!("-"));

        let record = build();
        assert_eq!(record.attribute("tag").found(), Some(AttrValue::from("a")));
        assert_eq!(record.get_or_default("unknown").unwrap(), AttrValue::from("-"));
        assert_eq!(installed_record_hooks(), vec!["tag", IGNORE_MISSING_HOOK]);

        // Resetting the missing-attribute policy leaves the other hook alone.
        reset_log_record_factory();
        assert_eq!(installed_record_hooks(), vec!["tag"]);
        reset_record_hooks();
    }

    #[test]
    fn test_last_install_wins_and_pop_restores_prior() {
        let _guard = HOOK_TEST_LOCK.lock();
        reset_record_hooks();
        set_log_record_ignore_missing_factory(json!("first"));
        set_log_record_ignore_missing_factory(json!("second"));
        assert_eq!(build().get_or_default("x").unwrap(), AttrValue::from("second"));

        pop_record_hook();
        assert_eq!(build().get_or_default("x").unwrap(), AttrValue::from("first"));
        reset_record_hooks();
    }

    #[test]
    fn test_ensure_does_not_duplicate() {
        let _guard = HOOK_TEST_LOCK.lock();
        reset_record_hooks();
        let a = ensure_log_record_ignore_missing_factory(json!(""));
        let b = ensure_log_record_ignore_missing_factory(json!(""));
        assert_eq!(a, b);
        assert_eq!(installed_record_hooks().len(), 1);
        assert!(remove_record_hook(a));
        assert!(!remove_record_hook(a));
    }
}
