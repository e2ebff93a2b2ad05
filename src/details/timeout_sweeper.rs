use crate::details::correlation::CorrelationTable;
use crate::details::run_progress::RunProgress;
use crate::details::statistics_aggregator::StatisticsAggregator;
use std::sync::Arc;
use std::time::{Duration, Instant};

const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);
const MAX_SWEEP_PERIOD: Duration = Duration::from_millis(100);

/// Drops requests that outlived their timeout and counts them as lost.
pub(crate) struct TimeoutSweeper {
    table: Arc<CorrelationTable>,
    statistics: Arc<StatisticsAggregator>,
    timeout: Duration,
}

impl TimeoutSweeper {
    pub(crate) fn new(table: Arc<CorrelationTable>, statistics: Arc<StatisticsAggregator>, timeout: Duration) -> Self {
        TimeoutSweeper { table, statistics, timeout }
    }

    /// A tenth of the timeout, so a loss is noticed at most 10% late.
    fn period(&self) -> Duration {
        (self.timeout / 10).clamp(MIN_SWEEP_PERIOD, MAX_SWEEP_PERIOD)
    }

    pub(crate) fn sweep(&self, now: Instant) -> usize {
        let expired = self.table.take_expired(now, self.timeout);
        for request in &expired {
            tracing::debug!(sequence_number = u16::from(request.sequence_number), "echo request timed out");
            self.statistics.record_timeout();
        }
        expired.len()
    }

    pub(crate) fn run(self, progress: &RunProgress) {
        let token = progress.token();
        let period = self.period();
        while !token.wait_timeout(period) {
            if self.sweep(Instant::now()) > 0 {
                progress.check_complete(&self.table);
            }
        }
    }
}
