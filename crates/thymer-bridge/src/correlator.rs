//! Request/response correlation over the peer connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use thymer_core::{BridgeError, CallId};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What a pending call eventually observes.
pub type CallOutcome = Result<Value, BridgeError>;

struct Waiter {
    tx: oneshot::Sender<CallOutcome>,
    created_at: Instant,
}

/// Outstanding calls keyed by id.
///
/// Every entry is removed exactly once: by a reply, by a bulk failure on
/// disconnect, by the waiter's own deadline, or when the waiter is dropped.
/// Removal goes through `DashMap::remove`, so whichever path gets there first
/// owns the completion.
pub struct Correlator {
    pending: DashMap<String, Waiter>,
    next_seq: AtomicU64,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Allocate the next id and register it before anything is sent.
    pub fn register(&self) -> PendingCall<'_> {
        let id = CallId::from_seq(self.next_seq.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        let _ = self.pending.insert(
            id.as_str().to_owned(),
            Waiter {
                tx,
                created_at: Instant::now(),
            },
        );
        PendingCall {
            correlator: self,
            id,
            rx,
        }
    }

    /// Deliver an outcome. Returns `false` if the id is no longer pending.
    pub fn complete(&self, id: &str, outcome: CallOutcome) -> bool {
        let Some((_, waiter)) = self.pending.remove(id) else {
            return false;
        };
        tracing::debug!(
            call_id = id,
            elapsed_ms = waiter.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "call completed"
        );
        // The waiter may have given up already.
        let _ = waiter.tx.send(outcome);
        true
    }

    /// Fail every pending call with `err`. Returns how many were failed.
    pub fn fail_all(&self, err: &BridgeError) -> usize {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        ids.into_iter()
            .filter(|id| self.complete(id, Err(err.clone())))
            .count()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller side of a registered call. Dropping it unregisters the id.
pub struct PendingCall<'a> {
    correlator: &'a Correlator,
    id: CallId,
    rx: oneshot::Receiver<CallOutcome>,
}

impl PendingCall<'_> {
    pub fn id(&self) -> &CallId {
        &self.id
    }

    /// Wait for the reply or the deadline, whichever comes first.
    pub async fn wait(mut self, timeout: Duration) -> CallOutcome {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::Disconnected),
            Err(_) => {
                if self.correlator.pending.remove(self.id.as_str()).is_some() {
                    return Err(BridgeError::Timeout(timeout));
                }
                // A completion won the race against the deadline.
                self.rx
                    .try_recv()
                    .unwrap_or(Err(BridgeError::Timeout(timeout)))
            }
        }
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        let _ = self.correlator.pending.remove(self.id.as_str());
    }
}
