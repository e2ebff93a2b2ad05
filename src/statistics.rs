use std::net::IpAddr;
use std::time::Duration;

/// One matched echo reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub ip_addr: IpAddr,
    pub sequence_number: u16,
    pub package_size: usize,
    /// Only known when the socket hands out the IP header (raw IPv4).
    pub ttl: Option<u8>,
    pub rtt: Duration,
}

/// Point-in-time copy of the counters and the RTT distribution of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Replies for requests that were already answered or timed out.
    pub packets_duplicated: u64,
    pub packets_timed_out: u64,
    /// Percentage of sent requests without reply, 0 when nothing was sent.
    pub packet_loss: f64,
    pub min_rtt: Duration,
    pub max_rtt: Duration,
    pub avg_rtt: Duration,
    pub std_dev_rtt: Duration,
    /// Every RTT in arrival order, only filled when `record_rtts` is set.
    pub rtts: Vec<Duration>,
}
