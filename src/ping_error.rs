use crate::AddressFamily;
use std::{fmt, io};

pub type PingResult<T> = std::result::Result<T, PingError>;

#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("unknown network {0}")]
    UnknownNetwork(String),
    #[error("no free ICMP identifier left in this process")]
    ResourceExhausted,
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    #[error("sending failed {consecutive_failures} times in a row: {source}")]
    Transmit {
        consecutive_failures: u32,
        #[source]
        source: io::Error,
    },
    #[error("receiving failed: {0}")]
    Receive(#[source] io::Error),
    #[error("run cancelled")]
    Cancelled,
    #[error("could not set up ICMP socket: {0}")]
    Socket(#[source] io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("pinger has already been run")]
    AlreadyStarted,
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

impl PingError {
    /// Whether the error ends a run. Cancellation is a normal way for a run to end and a
    /// malformed packet is only ever skipped.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PingError::Cancelled | PingError::MalformedPacket(_))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LookupErrorKind {
    /// The name does not resolve at all.
    NoSuchHost,
    /// The name resolves, but not to an address of the requested family.
    NoAddressOfFamily(AddressFamily),
    /// `host` is a literal address of the other family.
    InvalidAddress(AddressFamily),
}

/// Resolving `host` failed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LookupError {
    pub host: String,
    pub kind: LookupErrorKind,
}

impl LookupError {
    pub(crate) fn no_such_host(host: &str) -> Self {
        LookupError { host: host.to_owned(), kind: LookupErrorKind::NoSuchHost }
    }

    pub(crate) fn no_address_of_family(host: &str, family: AddressFamily) -> Self {
        LookupError { host: host.to_owned(), kind: LookupErrorKind::NoAddressOfFamily(family) }
    }

    pub(crate) fn invalid_address(host: &str, family: AddressFamily) -> Self {
        LookupError { host: host.to_owned(), kind: LookupErrorKind::InvalidAddress(family) }
    }

    #[must_use]
    pub fn is_invalid_address(&self) -> bool {
        matches!(self.kind, LookupErrorKind::InvalidAddress(_))
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "lookup {}", self.host)?;
        match self.kind {
            LookupErrorKind::NoSuchHost => write!(f, ": no such host"),
            LookupErrorKind::NoAddressOfFamily(family) => write!(f, ": no {family} address"),
            LookupErrorKind::InvalidAddress(family) => write!(f, ": not an {family} address"),
        }
    }
}

impl std::error::Error for LookupError {}
