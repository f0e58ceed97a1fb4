//! Translation between peer correlation ids and engine sequence numbers.
//!
//! Stratum peers may use any JSON value as a request id, but the engine
//! correlates calls by `u64` only. Each inbound request that expects a reply
//! gets the next sequence number, and its original id is parked here until
//! the reply is written. The table is shared by the reader (insert) and every
//! writer clone (remove), so both operations run under one lock.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::value::RawValue;
use tracing::debug;

use crate::error::{StratumRpcError, StratumRpcResult};

/// Pending inbound requests awaiting a reply.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Last sequence number handed out (0 = none yet)
    seq: u64,

    /// Original wire id for each unanswered sequence number
    ids: HashMap<u64, Box<RawValue>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next sequence number to `id` and remember it.
    pub fn register(&self, id: Box<RawValue>) -> StratumRpcResult<u64> {
        let mut inner = self.inner.lock();

        let seq = inner
            .seq
            .checked_add(1)
            .ok_or(StratumRpcError::SequenceExhausted)?;
        inner.seq = seq;

        debug!(seq, id = %id, "Registered inbound request");
        inner.ids.insert(seq, id);
        Ok(seq)
    }

    /// Remove and return the original id for `seq`.
    ///
    /// Fails for a sequence number that was never issued or was already
    /// answered.
    pub fn take(&self, seq: u64) -> StratumRpcResult<Box<RawValue>> {
        self.inner
            .lock()
            .ids
            .remove(&seq)
            .ok_or(StratumRpcError::UnknownSequence(seq))
    }

    /// Drop `seq` without answering it. Returns whether it was pending.
    pub fn forget(&self, seq: u64) -> bool {
        self.inner.lock().ids.remove(&seq).is_some()
    }

    /// Number of requests still awaiting a reply.
    pub fn len(&self) -> usize {
        self.inner.lock().ids.len()
    }

    #[cfg(test)]
    fn with_last_seq(seq: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                seq,
                ids: HashMap::new(),
            }),
        }
    }
}
