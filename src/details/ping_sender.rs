use crate::details::correlation::CorrelationTable;
use crate::details::icmp::{EchoSocket, SequenceNumber, TSocket};
use crate::details::records::PendingRequest;
use crate::details::run_progress::RunProgress;
use crate::details::statistics_aggregator::StatisticsAggregator;
use crate::PingError;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) struct SendSchedule {
    pub interval: Duration,
    /// 0 means unlimited.
    pub count: u64,
    pub max_consecutive_failures: u32,
}

/// Transmitter: one echo request per interval towards a single target.
pub(crate) struct PingSender<S> {
    echo_socket: Arc<EchoSocket<S>>,
    table: Arc<CorrelationTable>,
    statistics: Arc<StatisticsAggregator>,
    target: IpAddr,
    sequence_number: SequenceNumber,
}

impl<S> PingSender<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(
        echo_socket: Arc<EchoSocket<S>>,
        table: Arc<CorrelationTable>,
        statistics: Arc<StatisticsAggregator>,
        target: IpAddr,
    ) -> Self {
        PingSender { echo_socket, table, statistics, target, sequence_number: SequenceNumber::start_value() }
    }

    /// Sends the next request. The request is in the correlation table and counted as sent
    /// before the frame reaches the socket, and is rolled back if the socket refuses it.
    pub(crate) fn send_one(&mut self) -> io::Result<SequenceNumber> {
        let sequence_number = self.sequence_number;
        self.sequence_number = sequence_number.next();

        // (1) Frame the request.
        let package = self
            .echo_socket
            .encode(sequence_number)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // (2) Book it.
        self.statistics.record_sent();
        self.table.insert(PendingRequest {
            sequence_number,
            send_time: Instant::now(),
            payload_size: self.echo_socket.payload_size(),
        });

        // (3) Send it.
        if let Err(e) = self.echo_socket.send_to(self.target, &package) {
            self.table.take(sequence_number);
            self.statistics.retract_sent();
            return Err(e);
        }
        tracing::trace!(target_ip = %self.target, sequence_number = u16::from(sequence_number), "echo request sent");
        Ok(sequence_number)
    }

    /// Sends until the count is reached, the run is cancelled or sending keeps failing.
    pub(crate) fn run(mut self, schedule: &SendSchedule, progress: &RunProgress) {
        let token = progress.token().clone();
        let mut sent: u64 = 0;
        let mut consecutive_failures: u32 = 0;
        tracing::debug!(count = schedule.count, interval = ?schedule.interval, "PingSender start");

        while !token.is_cancelled() {
            match self.send_one() {
                Ok(_) => {
                    consecutive_failures = 0;
                    sent += 1;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(error = %e, consecutive_failures, "error sending echo request");
                    if consecutive_failures >= schedule.max_consecutive_failures {
                        progress.fail(PingError::Transmit { consecutive_failures, source: e });
                        break;
                    }
                }
            }

            if schedule.count > 0 && sent >= schedule.count {
                progress.mark_sending_done(&self.table);
                break;
            }
            if token.wait_timeout(schedule.interval) {
                break;
            }
        }
        tracing::debug!(sent, "PingSender end");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::echo::decode;
    use crate::details::icmp::socket::tests::{OnSend, SocketMock};
    use crate::details::icmp::IcmpVersion;
    use crate::details::run_progress::Outcome;
    use crate::{CancelToken, StopReason};
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn sender(socket: SocketMock) -> (PingSender<SocketMock>, Arc<CorrelationTable>, Arc<StatisticsAggregator>) {
        let echo_socket = Arc::new(EchoSocket::new(socket, IcmpVersion::V4, 0xBEEF, 56));
        let table = Arc::new(CorrelationTable::new());
        let statistics = Arc::new(StatisticsAggregator::new(false));
        (PingSender::new(echo_socket, table.clone(), statistics.clone(), LOCALHOST), table, statistics)
    }

    #[test]
    fn send_ping_packages_success() {
        let socket = SocketMock::new(OnSend::Drop);
        let (mut ping_sender, table, statistics) = sender(socket.clone());

        assert_eq!(SequenceNumber::from(0), ping_sender.send_one().unwrap());
        assert_eq!(SequenceNumber::from(1), ping_sender.send_one().unwrap());

        socket.should_send_number_of_messages(2).should_send_to_address(&LOCALHOST);
        assert_eq!(2, table.len());
        assert_eq!(2, statistics.packets_sent());
        let sequence_numbers: Vec<SequenceNumber> =
            socket.sent().iter().map(|(bytes, _)| decode(IcmpVersion::V4, bytes).unwrap().sequence_number).collect();
        assert_eq!(vec![SequenceNumber::from(0), SequenceNumber::from(1)], sequence_numbers);
    }

    #[test]
    fn when_socket_fails_then_ping_sender_rolls_back() {
        let (mut ping_sender, table, statistics) = sender(SocketMock::new(OnSend::ReturnErr));

        assert!(ping_sender.send_one().is_err());
        assert!(table.is_empty());
        assert_eq!(0, statistics.packets_sent());
    }

    #[test]
    fn run_stops_after_count_and_marks_sending_done() {
        let socket = SocketMock::new(OnSend::Drop);
        let (ping_sender, table, _) = sender(socket.clone());
        let progress = RunProgress::new(CancelToken::new());
        let schedule = SendSchedule { interval: Duration::from_millis(1), count: 3, max_consecutive_failures: 1 };

        ping_sender.run(&schedule, &progress);

        socket.should_send_number_of_messages(3);
        assert_eq!(3, table.len());
        // Requests are still in flight, so the run is not over yet.
        assert!(!progress.token().is_cancelled());
        table.take_expired(Instant::now() + Duration::from_secs(1), Duration::ZERO);
        progress.check_complete(&table);
        assert!(matches!(progress.take_outcome(), Some(Outcome::Finished(StopReason::CountReached))));
    }

    #[test]
    fn repeated_send_failures_are_escalated() {
        let (ping_sender, _, _) = sender(SocketMock::new(OnSend::ReturnErr));
        let progress = RunProgress::new(CancelToken::new());
        let schedule = SendSchedule { interval: Duration::from_millis(1), count: 0, max_consecutive_failures: 3 };

        ping_sender.run(&schedule, &progress);

        assert!(matches!(
            progress.take_outcome(),
            Some(Outcome::Failed(PingError::Transmit { consecutive_failures: 3, .. }))
        ));
    }

    #[test]
    fn cancelled_run_sends_nothing() {
        let socket = SocketMock::new(OnSend::Drop);
        let (ping_sender, _, _) = sender(socket.clone());
        let progress = RunProgress::new(CancelToken::new());
        progress.token().cancel();
        let schedule = SendSchedule { interval: Duration::from_secs(10), count: 0, max_consecutive_failures: 1 };

        ping_sender.run(&schedule, &progress);

        socket.should_send_number_of_messages(0);
    }
}
