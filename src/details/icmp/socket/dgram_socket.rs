use super::{domain_and_protocol, recv_from_initialized, TSocket};
use crate::details::icmp::IcmpVersion;
use socket2::Type;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::{io, time::Duration};

/// Unprivileged ICMP socket (`SOCK_DGRAM` + `IPPROTO_ICMP{,V6}`).
///
/// The kernel replaces the echo identifier with the local port of the socket and only delivers
/// replies carrying that identifier, so the socket is bound to the identifier we own.
pub(crate) struct DgramSocket {
    socket: socket2::Socket,
}

impl DgramSocket {
    pub(crate) fn new(version: IcmpVersion, identifier: u16, read_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!(?version, identifier, "creating DgramSocket");
        let (domain, protocol) = domain_and_protocol(version);
        let socket = socket2::Socket::new(domain, Type::DGRAM, Some(protocol))?;
        socket.set_read_timeout(Some(read_timeout))?;

        let unspecified = match version {
            IcmpVersion::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IcmpVersion::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        socket.bind(&SocketAddr::new(unspecified, identifier).into())?;
        Ok(DgramSocket { socket })
    }
}

impl TSocket for DgramSocket {
    fn send_to(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, &(*addr).into())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<u8>)> {
        let (n, ip) = recv_from_initialized(&self.socket, buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "socket closed"));
        }
        Ok((n, ip, None))
    }
}
