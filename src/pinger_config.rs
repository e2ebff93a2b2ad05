use crate::{PingError, PingResult};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Largest ICMP payload that fits into a single IPv4 datagram.
pub const MAX_PAYLOAD_SIZE: usize = 65_507;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum AddressFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    /// Parses a network name: "ip", "ip4" or "ip6".
    pub fn from_network(network: &str) -> PingResult<Self> {
        match network {
            "ip" => Ok(AddressFamily::Any),
            "ip4" => Ok(AddressFamily::V4),
            "ip6" => Ok(AddressFamily::V6),
            _ => Err(PingError::UnknownNetwork(network.to_owned())),
        }
    }

    #[must_use]
    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => ip.is_ipv4(),
            AddressFamily::V6 => ip.is_ipv6(),
        }
    }

    #[must_use]
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Any => write!(f, "IP"),
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SocketType {
    /// Unprivileged ICMP datagram socket. Needs `net.ipv4.ping_group_range` on Linux.
    #[default]
    Dgram,
    /// Raw ICMP socket. Needs root or `CAP_NET_RAW`.
    Raw,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug)]
pub struct PingerConfig {
    pub family: AddressFamily,
    /// Wait between two echo requests.
    pub interval: Duration,
    /// Number of echo requests to send; 0 sends until stopped.
    pub count: u64,
    /// How long a single request may stay unanswered before it counts as lost.
    pub timeout: Duration,
    /// Upper bound for the whole run.
    pub deadline: Option<Duration>,
    pub payload_size: usize,
    pub socket_type: SocketType,
    /// Read timeout of the socket; the receiver checks for cancellation at least this often.
    pub receive_poll_interval: Duration,
    pub max_consecutive_send_failures: u32,
    /// Keep every RTT in the statistics snapshot.
    pub record_rtts: bool,
}

impl Default for PingerConfig {
    fn default() -> Self {
        PingerConfig {
            family: AddressFamily::Any,
            interval: Duration::from_secs(1),
            count: 0,
            timeout: Duration::from_secs(1),
            deadline: None,
            payload_size: 56,
            socket_type: SocketType::Dgram,
            receive_poll_interval: Duration::from_millis(100),
            max_consecutive_send_failures: 5,
            record_rtts: false,
        }
    }
}

impl PingerConfig {
    pub fn validate(&self) -> PingResult<()> {
        if self.interval.is_zero() {
            return Err(PingError::InvalidConfig("interval must be greater than zero".to_owned()));
        }
        if self.timeout.is_zero() {
            return Err(PingError::InvalidConfig("timeout must be greater than zero".to_owned()));
        }
        if self.receive_poll_interval.is_zero() {
            return Err(PingError::InvalidConfig("receive poll interval must be greater than zero".to_owned()));
        }
        if self.max_consecutive_send_failures == 0 {
            return Err(PingError::InvalidConfig("send failure threshold must be at least 1".to_owned()));
        }
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(PingError::InvalidConfig(format!(
                "payload size {} exceeds {MAX_PAYLOAD_SIZE} bytes",
                self.payload_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_names() {
        assert_eq!(AddressFamily::Any, AddressFamily::from_network("ip").unwrap());
        assert_eq!(AddressFamily::V4, AddressFamily::from_network("ip4").unwrap());
        assert_eq!(AddressFamily::V6, AddressFamily::from_network("ip6").unwrap());
        assert!(matches!(AddressFamily::from_network("tcp"), Err(PingError::UnknownNetwork(n)) if n == "tcp"));
    }

    #[test]
    fn family_matches() {
        let v4: IpAddr = "127.0.0.1".parse().unwrap();
        let v6: IpAddr = "::1".parse().unwrap();
        assert!(AddressFamily::Any.matches(&v4) && AddressFamily::Any.matches(&v6));
        assert!(AddressFamily::V4.matches(&v4) && !AddressFamily::V4.matches(&v6));
        assert!(AddressFamily::V6.matches(&v6) && !AddressFamily::V6.matches(&v4));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PingerConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let zero_interval = PingerConfig { interval: Duration::ZERO, ..PingerConfig::default() };
        let zero_timeout = PingerConfig { timeout: Duration::ZERO, ..PingerConfig::default() };
        let huge_payload = PingerConfig { payload_size: MAX_PAYLOAD_SIZE + 1, ..PingerConfig::default() };
        let no_failures = PingerConfig { max_consecutive_send_failures: 0, ..PingerConfig::default() };

        for config in [zero_interval, zero_timeout, huge_payload, no_failures] {
            assert!(matches!(config.validate(), Err(PingError::InvalidConfig(_))));
        }
    }
}
