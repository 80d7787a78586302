use super::handler::HandlerFn;
use crate::{Result, RpcError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Method table shared by a root channel and all of its sub-channels.
///
/// Lookups are explicit key checks on a plain map; there are no built-in
/// or inherited entries a method name could collide with.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Arc<dyn HandlerFn>>>,
}

/// Shared registry pointer. Sub-channels hold a clone of the root's.
pub(crate) type RegistryPtr = Arc<HandlerRegistry>;

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl HandlerRegistry {
    // ---

    pub fn new() -> RegistryPtr {
        Arc::new(Self::default())
    }

    /// Store a handler for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::DuplicateHandler`] if `method` is taken and
    /// `allow_override` is false.
    pub fn insert(
        &self,
        method: &str,
        handler: Arc<dyn HandlerFn>,
        allow_override: bool,
    ) -> Result<()> {
        // ---
        let mut handlers = lock_ignore_poison(&self.handlers);
        if !allow_override && handlers.contains_key(method) {
            return Err(RpcError::DuplicateHandler(method.to_string()));
        }
        if handlers.insert(method.to_string(), handler).is_some() {
            crate::log_debug!("replaced handler for method: {method}");
        }
        Ok(())
    }

    pub fn remove(&self, method: &str) -> bool {
        lock_ignore_poison(&self.handlers).remove(method).is_some()
    }

    pub fn get(&self, method: &str) -> Option<Arc<dyn HandlerFn>> {
        lock_ignore_poison(&self.handlers).get(method).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        lock_ignore_poison(&self.handlers).contains_key(method)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::super::handler::RawHandler;
    use super::*;
    use serde_json::{json, Value};

    fn constant(value: Value) -> Arc<dyn HandlerFn> {
        Arc::new(RawHandler::new(move |_payload: Value, _ctx: super::super::CallContext| {
            let value = value.clone();
            async move { Ok(value) }
        }))
    }

    #[test]
    fn test_duplicate_rejected_without_override() {
        // ---
        let registry = HandlerRegistry::new();
        registry.insert("a", constant(json!(1)), false).unwrap();
        let err = registry.insert("a", constant(json!(2)), false).unwrap_err();
        assert!(matches!(err, RpcError::DuplicateHandler(m) if m == "a"));
    }

    #[tokio::test]
    async fn test_override_replaces() {
        // ---
        let registry = HandlerRegistry::new();
        registry.insert("a", constant(json!(1)), true).unwrap();
        registry.insert("a", constant(json!(2)), true).unwrap();

        let handler = registry.get("a").unwrap();
        let ctx = super::super::CallContext {
            correlation_id: crate::CorrelationId::new(1),
            aux_data: None,
            fire_and_forget: false,
        };
        assert_eq!(handler.call(Value::Null, ctx).await.unwrap(), json!(2));
    }

    #[test]
    fn test_no_implicit_entries() {
        // ---
        let registry = HandlerRegistry::new();
        for name in ["constructor", "toString", "__proto__", "hasOwnProperty", ""] {
            assert!(!registry.contains(name));
            assert!(registry.get(name).is_none());
        }
    }

    #[test]
    fn test_remove() {
        // ---
        let registry = HandlerRegistry::new();
        registry.insert("a", constant(json!(1)), false).unwrap();
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(!registry.contains("a"));
    }
}
