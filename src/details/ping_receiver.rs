use crate::details::correlation::CorrelationTable;
use crate::details::icmp::echo::decode;
use crate::details::icmp::{EchoKind, EchoSocket, TSocket};
use crate::details::records::ReceiveRecord;
use crate::details::run_progress::RunProgress;
use crate::details::statistics_aggregator::StatisticsAggregator;
use crate::{PingError, Sample};
use std::sync::Arc;

pub(crate) type OnReceive = Arc<dyn Fn(&Sample) + Send + Sync>;

/// What became of one inbound datagram.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Received {
    Sample(Sample),
    /// Reply for another pinger.
    Foreign,
    /// Reply for a request that was already answered or timed out.
    Duplicate,
    /// An echo request, e.g. our own on a raw loopback socket.
    NotAReply,
    Malformed,
}

/// Receiver: reads the socket, keeps what belongs to this pinger and matches it against the
/// correlation table.
pub(crate) struct PingReceiver<S> {
    echo_socket: Arc<EchoSocket<S>>,
    table: Arc<CorrelationTable>,
    statistics: Arc<StatisticsAggregator>,
    on_receive: Option<OnReceive>,
}

impl<S> PingReceiver<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(
        echo_socket: Arc<EchoSocket<S>>,
        table: Arc<CorrelationTable>,
        statistics: Arc<StatisticsAggregator>,
        on_receive: Option<OnReceive>,
    ) -> Self {
        PingReceiver { echo_socket, table, statistics, on_receive }
    }

    pub(crate) fn process(&self, record: ReceiveRecord) -> Received {
        let packet = match decode(self.echo_socket.version(), &record.bytes) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::trace!(error = %e, from = %record.ip_addr, "ignoring packet");
                return Received::Malformed;
            }
        };
        if packet.kind != EchoKind::Reply {
            return Received::NotAReply;
        }
        if packet.identifier != self.echo_socket.identifier() {
            tracing::trace!(identifier = packet.identifier, "ignoring reply for another pinger");
            return Received::Foreign;
        }

        let sequence_number = u16::from(packet.sequence_number);
        match self.table.take(packet.sequence_number) {
            None => {
                tracing::debug!(sequence_number, "duplicate or late reply");
                self.statistics.record_duplicate();
                Received::Duplicate
            }
            Some(request) => {
                if packet.payload.len() != request.payload_size {
                    tracing::debug!(
                        sequence_number,
                        sent = request.payload_size,
                        received = packet.payload.len(),
                        "reply payload differs in size from request"
                    );
                }
                let sample = Sample {
                    ip_addr: record.ip_addr,
                    sequence_number,
                    package_size: record.package_size,
                    ttl: record.ttl,
                    rtt: record.receive_time.saturating_duration_since(request.send_time),
                };
                tracing::trace!(
                    sequence_number,
                    rtt = ?sample.rtt,
                    sent_at = ?packet.timestamp(),
                    checksum_verified = packet.checksum_verified,
                    "echo reply matched"
                );
                self.statistics.record_sample(&sample);
                Received::Sample(sample)
            }
        }
    }

    /// Receives until the run is cancelled. Socket errors other than the read timeout end the
    /// run.
    pub(crate) fn run(self, progress: &RunProgress) {
        let token = progress.token();
        tracing::debug!("PingReceiver start");

        while !token.is_cancelled() {
            match self.echo_socket.try_receive() {
                // Timeout: nothing received.
                Ok(None) => {}
                Ok(Some(record)) => {
                    if let Received::Sample(sample) = self.process(record) {
                        if let Some(on_receive) = &self.on_receive {
                            on_receive(&sample);
                        }
                        progress.check_complete(&self.table);
                    }
                }
                Err(e) => {
                    if !token.is_cancelled() {
                        progress.fail(PingError::Receive(e));
                    }
                    break;
                }
            }
        }
        tracing::debug!("PingReceiver end");
    }
}
