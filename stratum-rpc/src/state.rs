//! Per-connection application state.
//!
//! Handlers often need to remember something about the peer between calls
//! (the authorized worker, negotiated extranonce, ...). [`ConnState`] is a
//! small string-keyed store shared between the read loop and handler tasks.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Connection-scoped key-value store.
#[derive(Default)]
pub struct ConnState {
    store: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ConnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under `key`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.store.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.store.write().insert(key.into(), Arc::new(value));
    }
}

impl std::fmt::Debug for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.read();
        let mut keys: Vec<_> = store.keys().collect();
        keys.sort();
        f.debug_struct("ConnState").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let state = ConnState::new();
        state.set("worker", "bc1q.rig1".to_string());
        state.set("difficulty", 512u64);

        assert_eq!(state.get::<String>("worker").as_deref(), Some(&"bc1q.rig1".to_string()));
        assert_eq!(state.get::<u64>("difficulty").as_deref(), Some(&512));
        assert!(state.get::<String>("missing").is_none());
    }

    #[test]
    fn test_wrong_type_is_none() {
        let state = ConnState::new();
        state.set("difficulty", 512u64);

        assert!(state.get::<u32>("difficulty").is_none());
    }

    #[test]
    fn test_set_replaces() {
        let state = ConnState::new();
        state.set("worker", "a".to_string());
        state.set("worker", "b".to_string());

        assert_eq!(state.get::<String>("worker").unwrap().as_str(), "b");
    }

    #[test]
    fn test_shared_across_threads() {
        let state = Arc::new(ConnState::new());

        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.set(format!("k{i}"), i))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..4u64 {
            assert_eq!(*state.get::<u64>(&format!("k{i}")).unwrap(), i);
        }
    }
}
