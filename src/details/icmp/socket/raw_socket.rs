use super::{domain_and_protocol, recv_from_initialized, TSocket};
use crate::details::icmp::IcmpVersion;
use pnet_packet::ipv4::Ipv4Packet;
use socket2::Type;
use std::net::{IpAddr, SocketAddr};
use std::{io, time::Duration};

// Largest IPv4 header (IHL = 15).
const MAX_IPV4_HEADER_SIZE: usize = 60;

/// Raw ICMP socket; needs elevated privileges.
pub(crate) struct RawSocket {
    socket: socket2::Socket,
    version: IcmpVersion,
}

impl RawSocket {
    pub(crate) fn new(version: IcmpVersion, read_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!(?version, "creating RawSocket");
        let (domain, protocol) = domain_and_protocol(version);
        let socket = socket2::Socket::new(domain, Type::RAW, Some(protocol))?;
        socket.set_read_timeout(Some(read_timeout))?;
        Ok(RawSocket { socket, version })
    }
}

impl TSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, &(*addr).into())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<u8>)> {
        if self.version == IcmpVersion::V6 {
            // Raw ICMPv6 sockets never expose the IPv6 header.
            let (n, ip) = recv_from_initialized(&self.socket, buf)?;
            return Ok((n, ip, None));
        }

        // On a raw IPv4 socket we get the whole IP packet.
        let mut recv_buf = vec![0u8; buf.len() + MAX_IPV4_HEADER_SIZE];
        let (n, ip) = recv_from_initialized(&self.socket, &mut recv_buf)?;
        let ipv4_packet = Ipv4Packet::new(&recv_buf[..n])
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "could not read IPv4 header"))?;
        let header_len = usize::from(ipv4_packet.get_header_length()) * 4;
        let ip_payload = recv_buf
            .get(header_len..n)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated IPv4 packet"))?;
        if ip_payload.len() > buf.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "ICMP message larger than buffer"));
        }
        // Return only the ICMP content.
        buf[..ip_payload.len()].copy_from_slice(ip_payload);
        Ok((ip_payload.len(), ip, Some(ipv4_packet.get_ttl())))
    }
}
