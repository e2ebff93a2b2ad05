use crate::details::icmp::SequenceNumber;
use std::net::IpAddr;
use std::time::Instant;

/// An echo request waiting for its reply. Not `Clone`: it is consumed exactly once, either by
/// the receiver or by the timeout sweep.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PendingRequest {
    pub sequence_number: SequenceNumber,
    pub send_time: Instant,
    pub payload_size: usize,
}

/// A datagram as read from the socket, before decoding.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ReceiveRecord {
    pub package_size: usize,
    pub ip_addr: IpAddr,
    pub ttl: Option<u8>,
    pub bytes: Vec<u8>,
    pub receive_time: Instant,
}
