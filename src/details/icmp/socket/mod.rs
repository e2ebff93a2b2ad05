use crate::details::icmp::IcmpVersion;
use crate::SocketType;
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use dgram_socket::DgramSocket;
use raw_socket::RawSocket;

mod dgram_socket;
mod raw_socket;

/// Network handle the engine sends echo requests through and reads replies from.
///
/// `recv_from` yields a bare ICMP message (no IP header) together with the source address and,
/// if known, the TTL. It must give up after a bounded time with `WouldBlock` or `TimedOut` so
/// the receiver can observe cancellation. Dropping the socket closes it.
pub trait TSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<u8>)>;
}

pub(crate) enum Socket {
    Raw(RawSocket),
    Dgram(DgramSocket),
}

impl Socket {
    pub(crate) fn new(
        socket_type: SocketType,
        version: IcmpVersion,
        identifier: u16,
        read_timeout: Duration,
    ) -> Result<Self, io::Error> {
        match socket_type {
            SocketType::Dgram => Ok(Socket::Dgram(DgramSocket::new(version, identifier, read_timeout)?)),
            SocketType::Raw => Ok(Socket::Raw(RawSocket::new(version, read_timeout)?)),
        }
    }
}

impl TSocket for Socket {
    fn send_to(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        match self {
            Socket::Dgram(socket) => socket.send_to(buf, addr),
            Socket::Raw(socket) => socket.send_to(buf, addr),
        }
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<u8>)> {
        match self {
            Socket::Dgram(socket) => socket.recv_from(buf),
            Socket::Raw(socket) => socket.recv_from(buf),
        }
    }
}

fn domain_and_protocol(version: IcmpVersion) -> (socket2::Domain, socket2::Protocol) {
    match version {
        IcmpVersion::V4 => (socket2::Domain::IPV4, socket2::Protocol::ICMPV4),
        IcmpVersion::V6 => (socket2::Domain::IPV6, socket2::Protocol::ICMPV6),
    }
}

fn recv_from_initialized(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
    // socket2 never writes uninitialized bytes into the buffer, which makes it sound to hand an
    // initialized `&mut [u8]` over as `&mut [MaybeUninit<u8>]`.
    // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
    let uninit = unsafe { &mut *(std::ptr::addr_of_mut!(*buf) as *mut [MaybeUninit<u8>]) };
    let (n, sock_addr) = socket.recv_from(uninit)?;
    let ip = sock_addr
        .as_socket()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "reply from a non-IP address"))?
        .ip();
    Ok((n, ip))
}
