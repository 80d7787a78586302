use crate::protocol::{CorrelationId, IdGenerator, WrappedResponse};
use crate::{Result, RpcError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Tracks calls waiting for responses
///
/// Maps correlation ids to oneshot channels. Every entry leaves the table
/// exactly once: through [`complete`](Self::complete) when the response
/// arrives, through [`remove`](Self::remove) when the caller gives up
/// (timeout, send failure, dropped future), or through
/// [`close`](Self::close) when the channel is torn down. Whichever comes
/// first takes the entry; the others find nothing and do nothing.
pub(super) struct CorrelationTable {
    // ---
    inner: Mutex<TableState>,
}

struct TableState {
    calls: HashMap<CorrelationId, oneshot::Sender<WrappedResponse>>,
    closed: bool,
}

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl CorrelationTable {
    // ---

    /// Create a new empty table
    pub fn new() -> Self {
        // ---
        Self {
            inner: Mutex::new(TableState {
                calls: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Allocate an id and register a pending call under it
    ///
    /// Ids still pending from before a counter wrap (or from rebasing onto a
    /// peer's ids) are skipped, so an id is never registered twice.
    pub fn register(
        &self,
        ids: &IdGenerator,
    ) -> Result<(CorrelationId, oneshot::Receiver<WrappedResponse>)> {
        // ---
        let mut state = lock_ignore_poison(&self.inner);
        if state.closed {
            return Err(RpcError::ChannelClosed);
        }

        let id = loop {
            let candidate = ids.next_id();
            if !state.calls.contains_key(&candidate) {
                break candidate;
            }
        };

        let (tx, rx) = oneshot::channel();
        state.calls.insert(id, tx);
        Ok((id, rx))
    }

    /// Complete a pending call with its response
    ///
    /// Returns true if the correlation id was pending. The entry is removed
    /// before the waiter is woken.
    pub fn complete(&self, response: WrappedResponse) -> bool {
        // ---
        let tx = {
            let mut state = lock_ignore_poison(&self.inner);
            state.calls.remove(&response.correlation_id)
        };

        match tx {
            Some(tx) => {
                // Receiver may already be gone if the caller dropped the call
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Remove a pending call without delivering a response
    pub fn remove(&self, correlation_id: CorrelationId) -> bool {
        // ---
        let mut state = lock_ignore_poison(&self.inner);
        state.calls.remove(&correlation_id).is_some()
    }

    /// Refuse new calls and drop every pending one
    ///
    /// Dropping the senders wakes each waiter with a closed-channel error.
    /// Returns how many calls were abandoned.
    pub fn close(&self) -> usize {
        // ---
        let drained: Vec<_> = {
            let mut state = lock_ignore_poison(&self.inner);
            state.closed = true;
            state.calls.drain().collect()
        };
        drained.len()
    }

    /// Get the number of pending calls
    pub fn len(&self) -> usize {
        // ---
        lock_ignore_poison(&self.inner).calls.len()
    }
}

/// Removes its pending call when dropped.
///
/// Held by the issuing future across the send and the wait, so every exit
/// path (timeout, send error, cancellation) releases the table entry. After
/// a completed response the entry is already gone and the drop is a no-op.
pub(super) struct PendingGuard<'a> {
    table: &'a CorrelationTable,
    correlation_id: CorrelationId,
}

impl<'a> PendingGuard<'a> {
    pub fn new(table: &'a CorrelationTable, correlation_id: CorrelationId) -> Self {
        Self {
            table,
            correlation_id,
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(self.correlation_id);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_complete() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();

        let (id, rx) = table.register(&ids).unwrap();
        assert_eq!(table.len(), 1);

        let response = WrappedResponse::success(id, json!("test response"));
        assert!(table.complete(response.clone()));

        // Should be removed after completion
        assert_eq!(table.len(), 0);

        // Receiver should get the response
        let received = rx.blocking_recv().unwrap();
        assert_eq!(received, response);
    }

    #[test]
    fn test_complete_is_once_only() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();

        let (id, _rx) = table.register(&ids).unwrap();
        assert!(table.complete(WrappedResponse::success(id, json!(1))));
        assert!(!table.complete(WrappedResponse::success(id, json!(2))));
        assert!(!table.remove(id));
    }

    #[test]
    fn test_remove() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();

        let (id, _rx) = table.register(&ids).unwrap();
        assert!(table.remove(id));
        assert_eq!(table.len(), 0);

        // Second remove should return false
        assert!(!table.remove(id));
    }

    #[test]
    fn test_complete_unknown_id() {
        // ---
        let table = CorrelationTable::new();
        let response = WrappedResponse::success(CorrelationId::new(77), json!(null));
        assert!(!table.complete(response));
    }

    #[test]
    fn test_sentinel_never_pending() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();
        let (id, _rx) = table.register(&ids).unwrap();
        assert!(!id.is_fire_and_forget());

        let response = WrappedResponse::success(CorrelationId::FIRE_AND_FORGET, json!(null));
        assert!(!table.complete(response));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_register_skips_pending_ids() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();

        let (first, _rx1) = table.register(&ids).unwrap();
        // Peer rebasing can't push the counter backwards, but a wrap can
        // land on an id still in flight; simulate that with a fresh counter.
        let rewound = IdGenerator::new();
        let (second, _rx2) = table.register(&rewound).unwrap();
        assert_ne!(first, second);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_guard_removes_on_drop() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();

        let (id, _rx) = table.register(&ids).unwrap();
        {
            let _guard = PendingGuard::new(&table, id);
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_close_wakes_waiters_and_refuses_new_calls() {
        // ---
        let table = CorrelationTable::new();
        let ids = IdGenerator::new();

        let (_id, rx) = table.register(&ids).unwrap();
        assert_eq!(table.close(), 1);
        assert!(rx.blocking_recv().is_err());
        assert!(matches!(table.register(&ids), Err(RpcError::ChannelClosed)));
    }
}
