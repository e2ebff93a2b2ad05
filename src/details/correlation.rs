use crate::details::icmp::SequenceNumber;
use crate::details::records::PendingRequest;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Sequence number -> request still waiting for a reply.
pub(crate) struct CorrelationTable {
    pending: Mutex<HashMap<SequenceNumber, PendingRequest>>,
}

impl CorrelationTable {
    pub(crate) fn new() -> Self {
        CorrelationTable { pending: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SequenceNumber, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, request: PendingRequest) {
        if let Some(stale) = self.lock().insert(request.sequence_number, request) {
            tracing::warn!(sequence_number = u16::from(stale.sequence_number), "sequence number reused while pending");
        }
    }

    pub(crate) fn take(&self, sequence_number: SequenceNumber) -> Option<PendingRequest> {
        self.lock().remove(&sequence_number)
    }

    /// Removes and returns every request older than `timeout`.
    pub(crate) fn take_expired(&self, now: Instant, timeout: Duration) -> Vec<PendingRequest> {
        let mut pending = self.lock();
        let expired: Vec<SequenceNumber> = pending
            .values()
            .filter(|request| now.saturating_duration_since(request.send_time) >= timeout)
            .map(|request| request.sequence_number)
            .collect();
        expired.into_iter().filter_map(|sequence_number| pending.remove(&sequence_number)).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
