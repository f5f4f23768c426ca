//! Request correlator: allocates monotonically increasing request IDs and
//! routes each eventual reply back to the `oneshot` the caller is awaiting.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::DeviceHiveError;

type Continuation = oneshot::Sender<Result<Value, DeviceHiveError>>;

/// Not thread-shared on its own — owned by the single actor task that also
/// owns the rest of a service's mutable state (§5 of the concurrency model).
#[derive(Default)]
pub struct Correlator {
    next_id: u64,
    pending: HashMap<u64, Continuation>,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator { next_id: 0, pending: HashMap::new() }
    }

    /// Allocate a fresh request id and register its continuation. Returns
    /// the id to stamp onto the outbound request and a receiver the caller
    /// awaits for the eventual reply.
    pub fn allocate(&mut self) -> (u64, oneshot::Receiver<Result<Value, DeviceHiveError>>) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, rx)
    }

    /// Resolve a pending request. Unknown ids are silently ignored — a late
    /// or spurious reply is not an error condition.
    pub fn resolve(&mut self, id: u64, result: Result<Value, DeviceHiveError>) {
        if let Some(tx) = self.pending.remove(&id) {
            let _ = tx.send(result);
        }
    }

    /// Drain every pending request, resolving each with
    /// `DeviceHiveError::Cancelled` (see DESIGN.md's Open Question (a)).
    pub fn cancel_all(&mut self) {
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(DeviceHiveError::Cancelled));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
