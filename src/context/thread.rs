//! Per-thread mapping store.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Mappings of every context this thread has written to, by context id.
    // Dropped with the thread.
    static MAPPINGS: RefCell<HashMap<u64, Map<String, Value>>> = RefCell::new(HashMap::new());
}

/// A mapping whose contents are private to each thread.
///
/// Each thread's data lives in thread-local storage and goes away when the
/// thread exits. Reads never allocate a mapping; the first write does. The
/// handle itself is shared, so one instance can live in a `static`.
#[derive(Debug)]
pub struct ThreadMappingContext {
    id: u64,
}

impl Default for ThreadMappingContext {
    fn default() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl ThreadMappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(Option<&Map<String, Value>>) -> R) -> R {
        MAPPINGS.with(|mappings| f(mappings.borrow().get(&self.id)))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        MAPPINGS.with(|mappings| {
            let mut mappings = mappings.borrow_mut();
            let map = mappings.entry(self.id).or_default();
            let out = f(map);
            if map.is_empty() {
                mappings.remove(&self.id);
            }
            out
        })
    }

    /// Replace the current thread's mapping. `None` resets it to empty;
    /// anything other than a JSON object is rejected.
    pub fn init(&self, data: Option<Value>) -> Result<()> {
        let map = match data {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(FormatterError::InvalidContext(format!(
                    "data must be a mapping, got {}",
                    other
                )))
            }
        };
        self.write(|current| *current = map);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|map| map.and_then(|map| map.get(key).cloned()))
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.write(|map| map.insert(key.to_string(), value));
    }

    pub fn pop(&self, key: &str) -> Option<Value> {
        if !self.contains(key) {
            return None;
        }
        self.write(|map| map.remove(key))
    }

    /// Remove `key`, failing when it is not set on this thread.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.pop(key)
            .map(|_| ())
            .ok_or_else(|| FormatterError::missing(key, key))
    }

    pub fn clear(&self) {
        MAPPINGS.with(|mappings| mappings.borrow_mut().remove(&self.id));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read(|map| map.is_some_and(|map| map.contains_key(key)))
    }

    pub fn len(&self) -> usize {
        self.read(|map| map.map_or(0, Map::len))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.read(|map| map.map(|map| map.keys().cloned().collect()).unwrap_or_default())
    }

    /// Copy of the current thread's mapping.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.read(|map| map.cloned().unwrap_or_default())
    }
}

impl Drop for ThreadMappingContext {
    fn drop(&mut self) {
        // Other threads release theirs on exit.
        MAPPINGS.try_with(|mappings| mappings.borrow_mut().remove(&self.id)).ok();
    }
}
