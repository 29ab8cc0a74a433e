//! Request/reply correlation.
//!
//! The correlator hands out identifiers and owns one completion slot per
//! in-flight call. Inbound replies resolve slots by identifier, so replies
//! may arrive in any order.
//!
//! # Lifecycle of a call
//!
//! ```text
//! register() ──► PendingCall ──► wait()
//!      │                           ▲
//!      ▼                           │
//!   slots[id] ── resolve(id) ──────┘
//!      │
//!      └── removed when the PendingCall drops
//! ```
//!
//! All slot operations happen under one lock. [`Correlator::close`] flips a
//! terminal flag and drains the slots under that same lock, so a call
//! registered concurrently with disposal is either drained or resolved at
//! registration, never left waiting.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, RequestIdGenerator};
use crate::protocol::Reply;

// ============================================================================
// Types
// ============================================================================

/// Completion sender for one call.
type Slot = oneshot::Sender<Result<Value>>;

/// Slot table guarded by the correlator lock.
#[derive(Default)]
struct Slots {
    pending: FxHashMap<RequestId, Slot>,
    closed: bool,
}

// ============================================================================
// Correlator
// ============================================================================

/// Tracks pending calls by [`RequestId`].
#[derive(Default)]
pub struct Correlator {
    ids: RequestIdGenerator,
    slots: Mutex<Slots>,
}

impl Correlator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new call.
    ///
    /// After [`close`](Self::close) the returned call is already resolved
    /// with `Value::Null` and [`PendingCall::is_closed`] is `true`.
    pub fn register(&self) -> PendingCall<'_> {
        let id = self.ids.next_id();
        let (tx, rx) = oneshot::channel();

        let closed = {
            let mut slots = self.slots.lock();
            if slots.closed {
                let _ = tx.send(Ok(Value::Null));
                true
            } else {
                slots.pending.insert(id, tx);
                false
            }
        };

        trace!(%id, closed, "Call registered");

        PendingCall {
            id,
            rx,
            closed,
            correlator: self,
        }
    }

    /// Fulfils the call `id`.
    ///
    /// Returns `false` if no such call is pending.
    pub fn resolve(&self, id: RequestId, result: Result<Value>) -> bool {
        let slot = self.slots.lock().pending.remove(&id);

        match slot {
            Some(tx) => {
                let _ = tx.send(result);
                trace!(%id, "Call resolved");
                true
            }
            None => {
                debug!(%id, "Reply for unknown request");
                false
            }
        }
    }

    /// Fulfils the call a reply answers, unwrapping its result.
    pub fn resolve_reply(&self, reply: Reply) -> bool {
        let id = reply.id;
        self.resolve(id, reply.into_result())
    }

    /// Drops the slot for `id` without fulfilling it.
    pub fn remove(&self, id: RequestId) -> bool {
        self.slots.lock().pending.remove(&id).is_some()
    }

    /// Fails every pending call with `make_error()`.
    ///
    /// The correlator stays open for later calls.
    pub fn fail_all(&self, make_error: impl Fn() -> Error) -> usize {
        let drained: Vec<_> = self.slots.lock().pending.drain().collect();
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(make_error()));
        }

        if count > 0 {
            debug!(count, "Failed pending calls");
        }
        count
    }

    /// Closes the correlator and resolves every pending call with
    /// `Value::Null`. Idempotent.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock();
            slots.closed = true;
            slots.pending.drain().collect()
        };
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Ok(Value::Null));
        }

        if count > 0 {
            debug!(count, "Resolved pending calls on close");
        }
        count
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[cfg(test)]
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    /// Returns the number of pending calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.lock().pending.len()
    }
}

// ============================================================================
// PendingCall
// ============================================================================

/// A registered call awaiting its reply.
///
/// Dropping it removes the slot, whether or not a reply arrived.
#[must_use = "a pending call does nothing unless awaited"]
pub struct PendingCall<'a> {
    id: RequestId,
    rx: oneshot::Receiver<Result<Value>>,
    closed: bool,
    correlator: &'a Correlator,
}

impl PendingCall<'_> {
    /// Identifier the request must carry.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// `true` if registered after the correlator closed.
    ///
    /// Such a call already holds `Value::Null` and must not be sent.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns the error the call was resolved with.
    pub async fn wait(mut self) -> Result<Value> {
        (&mut self.rx).await?
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.correlator.remove(self.id) {
            trace!(id = %self.id, "Abandoned call removed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::protocol::Inbound;

    fn reply(text: &str) -> Reply {
        match Inbound::decode(text).expect("decode") {
            Inbound::Reply(reply) => reply,
            Inbound::Other(_) => panic!("not a reply"),
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let correlator = Correlator::new();
        let a = correlator.register();
        let b = correlator.register();
        assert!(b.id() > a.id());
        assert_eq!(correlator.pending_count(), 2);
    }

    #[test]
    fn test_pending_until_resolved() {
        let correlator = Correlator::new();
        let call = correlator.register();
        let id = call.id();

        let mut wait = task::spawn(call.wait());
        assert_pending!(wait.poll());

        assert!(correlator.resolve(id, Ok(json!(5))));
        assert!(wait.is_woken());
        let value = assert_ready!(wait.poll()).expect("ok");
        assert_eq!(value, json!(5));
        drop(wait);

        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_drop_removes_slot() {
        let correlator = Correlator::new();
        let call = correlator.register();
        let id = call.id();
        drop(call);

        assert_eq!(correlator.pending_count(), 0);
        assert!(!correlator.resolve(id, Ok(Value::Null)));
    }

    #[test]
    fn test_abandoned_wait_removes_slot() {
        let correlator = Correlator::new();
        let mut wait = task::spawn(correlator.register().wait());
        assert_pending!(wait.poll());
        assert_eq!(correlator.pending_count(), 1);

        drop(wait);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_reply_is_dropped() {
        let correlator = Correlator::new();
        let call = correlator.register();

        assert!(!correlator.resolve_reply(reply(r#"{"replyID": 999, "result": 1}"#)));
        assert_eq!(correlator.pending_count(), 1);

        let id = call.id().as_u64();
        assert!(correlator.resolve_reply(reply(&format!(r#"{{"replyID": {id}, "result": "2"}}"#))));
        assert_eq!(call.wait().await.expect("ok"), json!(2));
    }

    #[tokio::test]
    async fn test_error_reply_reaches_only_its_caller() {
        let correlator = Correlator::new();
        let failing = correlator.register();
        let healthy = correlator.register();

        let failing_id = failing.id().as_u64();
        let healthy_id = healthy.id().as_u64();
        correlator.resolve_reply(reply(&format!(
            r#"{{"replyID": {failing_id}, "error": "boom"}}"#
        )));
        correlator.resolve_reply(reply(&format!(r#"{{"replyID": {healthy_id}}}"#)));

        assert!(matches!(failing.wait().await, Err(Error::Script { .. })));
        assert_eq!(healthy.wait().await.expect("ok"), Value::Null);
    }

    #[tokio::test]
    async fn test_close_resolves_pending_with_null() {
        let correlator = Correlator::new();
        let first = correlator.register();
        let second = correlator.register();

        assert_eq!(correlator.close(), 2);
        assert_eq!(correlator.close(), 0);

        assert_eq!(first.wait().await.expect("ok"), Value::Null);
        assert_eq!(second.wait().await.expect("ok"), Value::Null);
    }

    #[tokio::test]
    async fn test_register_after_close_is_already_resolved() {
        let correlator = Correlator::new();
        correlator.close();

        let call = correlator.register();
        assert!(call.is_closed());
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(call.wait().await.expect("ok"), Value::Null);
    }

    #[tokio::test]
    async fn test_fail_all_keeps_correlator_open() {
        let correlator = Correlator::new();
        let call = correlator.register();

        assert_eq!(correlator.fail_all(|| Error::ConnectionClosed), 1);
        assert!(matches!(call.wait().await, Err(Error::ConnectionClosed)));

        let later = correlator.register();
        assert!(!later.is_closed());
        assert!(!correlator.is_closed());
    }

    #[tokio::test]
    async fn test_close_races_with_registration() {
        let correlator = Arc::new(Correlator::new());

        let registrars: Vec<_> = (0..4)
            .map(|_| {
                let correlator = Arc::clone(&correlator);
                tokio::spawn(async move {
                    let mut results = Vec::new();
                    for _ in 0..200 {
                        results.push(correlator.register().wait().await);
                        tokio::task::yield_now().await;
                        if correlator.is_closed() {
                            break;
                        }
                    }
                    results
                })
            })
            .collect();

        tokio::task::yield_now().await;
        correlator.close();

        for registrar in registrars {
            for result in registrar.await.expect("task") {
                assert_eq!(result.expect("ok"), Value::Null);
            }
        }
        assert_eq!(correlator.pending_count(), 0);
    }
}
