use crate::details::correlation::CorrelationTable;
use crate::{CancelToken, PingError, StopReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub(crate) enum Outcome {
    Finished(StopReason),
    Failed(PingError),
}

/// Bookkeeping the background units share to end a run. The first recorded outcome wins;
/// recording one cancels the run token.
pub(crate) struct RunProgress {
    token: CancelToken,
    sending_done: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
}

impl RunProgress {
    pub(crate) fn new(token: CancelToken) -> Self {
        RunProgress { token, sending_done: AtomicBool::new(false), outcome: Mutex::new(None) }
    }

    pub(crate) fn token(&self) -> &CancelToken {
        &self.token
    }

    fn record(&self, outcome: Outcome) {
        {
            let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                tracing::debug!(?outcome, "run outcome");
                *slot = Some(outcome);
            }
        }
        self.token.cancel();
    }

    pub(crate) fn finish(&self, reason: StopReason) {
        self.record(Outcome::Finished(reason));
    }

    pub(crate) fn fail(&self, error: PingError) {
        tracing::error!(%error, "run failed");
        self.record(Outcome::Failed(error));
    }

    /// The transmitter sent its last request.
    pub(crate) fn mark_sending_done(&self, table: &CorrelationTable) {
        self.sending_done.store(true, Ordering::SeqCst);
        self.check_complete(table);
    }

    /// Ends the run once nothing is left to send and nothing is in flight. Every party that
    /// shrinks the table calls this after doing so.
    pub(crate) fn check_complete(&self, table: &CorrelationTable) {
        if self.sending_done.load(Ordering::SeqCst) && table.is_empty() {
            self.finish(StopReason::CountReached);
        }
    }

    pub(crate) fn take_outcome(&self) -> Option<Outcome> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::records::PendingRequest;
    use std::time::Instant;

    #[test]
    fn first_outcome_wins() {
        let progress = RunProgress::new(CancelToken::new());
        progress.finish(StopReason::Stopped);
        progress.fail(PingError::ResourceExhausted);

        assert!(progress.token().is_cancelled());
        assert!(matches!(progress.take_outcome(), Some(Outcome::Finished(StopReason::Stopped))));
    }

    #[test]
    fn completes_only_when_sending_is_done_and_table_is_empty() {
        let progress = RunProgress::new(CancelToken::new());
        let table = CorrelationTable::new();
        table.insert(PendingRequest { sequence_number: 0.into(), send_time: Instant::now(), payload_size: 0 });

        progress.check_complete(&table);
        progress.mark_sending_done(&table);
        assert!(!progress.token().is_cancelled());

        table.take(0.into());
        progress.check_complete(&table);
        assert!(progress.token().is_cancelled());
        assert!(matches!(progress.take_outcome(), Some(Outcome::Finished(StopReason::CountReached))));
    }
}
