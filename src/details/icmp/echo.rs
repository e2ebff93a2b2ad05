use crate::details::icmp::SequenceNumber;
use crate::{PingError, PingResult};
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket, echo_request::MutableEchoRequestPacket, IcmpCode, IcmpPacket, IcmpTypes,
};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet_packet::Packet;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Type, code, checksum, identifier and sequence number.
pub(crate) const ECHO_HEADER_SIZE: usize = 8;
/// Leading payload bytes that carry the send time, when the payload is large enough.
pub(crate) const TIMESTAMP_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum IcmpVersion {
    V4,
    V6,
}

impl IcmpVersion {
    pub(crate) fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IcmpVersion::V4,
            IpAddr::V6(_) => IcmpVersion::V6,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum EchoKind {
    Request,
    Reply,
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct EchoPacket {
    pub kind: EchoKind,
    pub identifier: u16,
    pub sequence_number: SequenceNumber,
    pub payload: Vec<u8>,
    /// ICMPv6 checksums cover a pseudo header with the local address; the kernel checks those.
    pub checksum_verified: bool,
}

impl EchoPacket {
    pub(crate) fn timestamp(&self) -> Option<SystemTime> {
        let bytes: [u8; TIMESTAMP_SIZE] = self.payload.get(..TIMESTAMP_SIZE)?.try_into().ok()?;
        UNIX_EPOCH.checked_add(Duration::from_nanos(u64::from_be_bytes(bytes)))
    }
}

fn stamp(payload: &[u8]) -> Vec<u8> {
    let mut payload = payload.to_vec();
    if payload.len() >= TIMESTAMP_SIZE {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos());
        let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);
        payload[..TIMESTAMP_SIZE].copy_from_slice(&nanos.to_be_bytes());
    }
    payload
}

/// Builds an echo request and stamps the current time into the first payload bytes.
pub(crate) fn encode_echo_request(
    version: IcmpVersion,
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> PingResult<Vec<u8>> {
    let payload = stamp(payload);
    let mut buf = vec![0u8; ECHO_HEADER_SIZE + payload.len()];
    let too_small = || PingError::MalformedPacket("could not create ICMP package".to_owned());

    match version {
        IcmpVersion::V4 => {
            let mut package = MutableEchoRequestPacket::new(&mut buf).ok_or_else(too_small)?;
            package.set_icmp_type(IcmpTypes::EchoRequest);
            package.set_icmp_code(IcmpCode::new(0));
            package.set_identifier(identifier);
            package.set_sequence_number(sequence_number.into());
            package.set_payload(&payload);
            package.set_checksum(0_u16);
            let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet()).ok_or_else(too_small)?);
            package.set_checksum(checksum);
        }
        IcmpVersion::V6 => {
            // pnet has no echo layout for ICMPv6; identifier and sequence lead the body.
            let mut body = Vec::with_capacity(4 + payload.len());
            body.extend_from_slice(&identifier.to_be_bytes());
            body.extend_from_slice(&u16::from(sequence_number).to_be_bytes());
            body.extend_from_slice(&payload);

            let mut package = MutableIcmpv6Packet::new(&mut buf).ok_or_else(too_small)?;
            package.set_icmpv6_type(Icmpv6Types::EchoRequest);
            package.set_icmpv6_code(Icmpv6Code::new(0));
            // Filled in by the kernel.
            package.set_checksum(0_u16);
            package.set_payload(&body);
        }
    }
    Ok(buf)
}

/// Parses an ICMP message (without IP header). Anything that is not a well formed echo
/// request or reply is a `MalformedPacket`.
pub(crate) fn decode(version: IcmpVersion, bytes: &[u8]) -> PingResult<EchoPacket> {
    if bytes.len() < ECHO_HEADER_SIZE {
        return Err(PingError::MalformedPacket(format!("{} bytes is too short for an echo message", bytes.len())));
    }

    match version {
        IcmpVersion::V4 => {
            let icmp = IcmpPacket::new(bytes)
                .ok_or_else(|| PingError::MalformedPacket("could not read ICMP header".to_owned()))?;
            let kind = match icmp.get_icmp_type() {
                IcmpTypes::EchoReply => EchoKind::Reply,
                IcmpTypes::EchoRequest => EchoKind::Request,
                other => return Err(PingError::MalformedPacket(format!("unexpected ICMP type {}", other.0))),
            };
            let expected = pnet_packet::icmp::checksum(&icmp);
            if icmp.get_checksum() != expected {
                return Err(PingError::MalformedPacket(format!(
                    "checksum mismatch: got {:#06x}, expected {expected:#06x}",
                    icmp.get_checksum()
                )));
            }
            let echo = EchoReplyPacket::new(bytes)
                .ok_or_else(|| PingError::MalformedPacket("could not read echo header".to_owned()))?;
            Ok(EchoPacket {
                kind,
                identifier: echo.get_identifier(),
                sequence_number: echo.get_sequence_number().into(),
                payload: echo.payload().to_vec(),
                checksum_verified: true,
            })
        }
        IcmpVersion::V6 => {
            let icmp = Icmpv6Packet::new(bytes)
                .ok_or_else(|| PingError::MalformedPacket("could not read ICMPv6 header".to_owned()))?;
            let kind = match icmp.get_icmpv6_type() {
                Icmpv6Types::EchoReply => EchoKind::Reply,
                Icmpv6Types::EchoRequest => EchoKind::Request,
                other => return Err(PingError::MalformedPacket(format!("unexpected ICMPv6 type {}", other.0))),
            };
            let body = icmp.payload();
            Ok(EchoPacket {
                kind,
                identifier: u16::from_be_bytes([body[0], body[1]]),
                sequence_number: u16::from_be_bytes([body[2], body[3]]).into(),
                payload: body[4..].to_vec(),
                checksum_verified: false,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Turns an encoded request into the reply a peer would send back.
    pub(crate) fn reply_to(version: IcmpVersion, request: &[u8]) -> Vec<u8> {
        let mut reply = request.to_vec();
        match version {
            IcmpVersion::V4 => {
                reply[0] = IcmpTypes::EchoReply.0;
                reply[2] = 0;
                reply[3] = 0;
                let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(&reply).unwrap());
                reply[2..4].copy_from_slice(&checksum.to_be_bytes());
            }
            IcmpVersion::V6 => reply[0] = Icmpv6Types::EchoReply.0,
        }
        reply
    }

    pub(crate) fn echo_reply(version: IcmpVersion, identifier: u16, sequence_number: u16) -> Vec<u8> {
        let request = encode_echo_request(version, identifier, sequence_number.into(), &[0xAB; 16]).unwrap();
        reply_to(version, &request)
    }

    #[test]
    fn encode_v4_request_has_valid_checksum() {
        let bytes = encode_echo_request(IcmpVersion::V4, 0xABCD, SequenceNumber::from(7), &[0u8; 56]).unwrap();
        assert_eq!(ECHO_HEADER_SIZE + 56, bytes.len());

        let packet = decode(IcmpVersion::V4, &bytes).unwrap();
        assert_eq!(EchoKind::Request, packet.kind);
        assert_eq!(0xABCD, packet.identifier);
        assert_eq!(SequenceNumber::from(7), packet.sequence_number);
        assert!(packet.checksum_verified);
    }

    #[test]
    fn decode_v4_reply() {
        let packet = decode(IcmpVersion::V4, &echo_reply(IcmpVersion::V4, 42, 3)).unwrap();
        assert_eq!(EchoKind::Reply, packet.kind);
        assert_eq!(42, packet.identifier);
        assert_eq!(SequenceNumber::from(3), packet.sequence_number);
        assert_eq!(16, packet.payload.len());
    }

    #[test]
    fn decode_v6_reply() {
        let packet = decode(IcmpVersion::V6, &echo_reply(IcmpVersion::V6, 42, 3)).unwrap();
        assert_eq!(EchoKind::Reply, packet.kind);
        assert_eq!(42, packet.identifier);
        assert_eq!(SequenceNumber::from(3), packet.sequence_number);
        assert!(!packet.checksum_verified);
    }

    #[test]
    fn timestamp_is_embedded() {
        let before = SystemTime::now() - Duration::from_secs(1);
        let bytes = encode_echo_request(IcmpVersion::V4, 1, SequenceNumber::start_value(), &[0u8; 16]).unwrap();
        let timestamp = decode(IcmpVersion::V4, &bytes).unwrap().timestamp().unwrap();
        assert!(timestamp >= before);
        assert!(timestamp <= SystemTime::now());
    }

    #[test]
    fn short_payload_has_no_timestamp() {
        let bytes = encode_echo_request(IcmpVersion::V4, 1, SequenceNumber::start_value(), &[0u8; 4]).unwrap();
        assert_eq!(None, decode(IcmpVersion::V4, &bytes).unwrap().timestamp());
    }

    #[test]
    fn corrupted_checksum_is_malformed() {
        let mut bytes = echo_reply(IcmpVersion::V4, 1, 1);
        bytes[10] ^= 0xFF;
        assert!(matches!(decode(IcmpVersion::V4, &bytes), Err(PingError::MalformedPacket(_))));
    }

    #[test]
    fn truncated_packet_is_malformed() {
        let bytes = echo_reply(IcmpVersion::V4, 1, 1);
        assert!(matches!(decode(IcmpVersion::V4, &bytes[..5]), Err(PingError::MalformedPacket(_))));
    }

    #[test]
    fn unexpected_type_is_malformed() {
        // Destination unreachable.
        let mut bytes = echo_reply(IcmpVersion::V4, 1, 1);
        bytes[0] = 3;
        assert!(matches!(decode(IcmpVersion::V4, &bytes), Err(PingError::MalformedPacket(_))));

        // Neighbor solicitation.
        let mut bytes = echo_reply(IcmpVersion::V6, 1, 1);
        bytes[0] = 135;
        assert!(matches!(decode(IcmpVersion::V6, &bytes), Err(PingError::MalformedPacket(_))));
    }
}
