use super::echo::{encode_echo_request, IcmpVersion, ECHO_HEADER_SIZE};
use super::{SequenceNumber, TSocket};
use crate::details::records::ReceiveRecord;
use crate::PingResult;
use rand::Rng;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

// Room for IP options and ICMP extensions on top of the echo we sent.
const RECEIVE_SLACK: usize = 128;

/// Frames echo requests for one target and identifier and moves them through a socket.
pub(crate) struct EchoSocket<S> {
    socket: S,
    version: IcmpVersion,
    identifier: u16,
    payload: Vec<u8>,
}

impl<S> EchoSocket<S>
where
    S: TSocket,
{
    pub(crate) fn new(socket: S, version: IcmpVersion, identifier: u16, payload_size: usize) -> Self {
        let mut payload = vec![0u8; payload_size];
        rand::thread_rng().fill(&mut payload[..]);
        EchoSocket { socket, version, identifier, payload }
    }

    pub(crate) fn version(&self) -> IcmpVersion {
        self.version
    }

    pub(crate) fn identifier(&self) -> u16 {
        self.identifier
    }

    pub(crate) fn payload_size(&self) -> usize {
        self.payload.len()
    }

    pub(crate) fn encode(&self, sequence_number: SequenceNumber) -> PingResult<Vec<u8>> {
        encode_echo_request(self.version, self.identifier, sequence_number, &self.payload)
    }

    pub(crate) fn send_to(&self, ip: IpAddr, package: &[u8]) -> io::Result<usize> {
        self.socket.send_to(package, &SocketAddr::new(ip, 0))
    }

    /// `Ok(None)` when the read timeout of the socket elapsed without data or the datagram was
    /// unusable.
    pub(crate) fn try_receive(&self) -> io::Result<Option<ReceiveRecord>> {
        let mut buf = vec![0u8; ECHO_HEADER_SIZE + self.payload.len() + RECEIVE_SLACK];
        match self.socket.recv_from(&mut buf) {
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::trace!(error = %e, "dropping datagram");
                Ok(None)
            }
            Err(e) => Err(e),
            Ok((package_size, ip_addr, ttl)) => {
                let receive_time = Instant::now();
                buf.truncate(package_size);
                Ok(Some(ReceiveRecord { package_size, ip_addr, ttl, bytes: buf, receive_time }))
            }
        }
    }
}
