use crate::{AddressFamily, LookupError, PingResult};
use std::io;
use std::net::IpAddr;

/// Name lookup used by [`resolve_with`]; returns addresses in resolver order.
pub trait HostLookup {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// The operating system resolver (`getaddrinfo`).
pub struct SystemLookup;

impl HostLookup for SystemLookup {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        dns_lookup::lookup_host(host)
    }
}

/// Resolves `host` with the system resolver. See [`resolve_with`].
pub fn resolve(host: &str, family: AddressFamily) -> PingResult<IpAddr> {
    resolve_with(&SystemLookup, host, family)
}

/// Resolves a literal IPv4/IPv6 address or a DNS name to one address of `family`.
///
/// A literal of the wrong family fails with an
/// [`InvalidAddress`](crate::LookupErrorKind::InvalidAddress) lookup error. For names the first
/// address of the requested family wins; nothing is cached or retried.
pub fn resolve_with<L>(lookup: &L, host: &str, family: AddressFamily) -> PingResult<IpAddr>
where
    L: HostLookup + ?Sized,
{
    if let Ok(ip) = host.parse::<IpAddr>() {
        if family.matches(&ip) {
            return Ok(ip);
        }
        return Err(LookupError::invalid_address(host, family).into());
    }

    let ips = match lookup.lookup(host) {
        Ok(ips) => ips,
        Err(e) => {
            tracing::debug!(host, error = %e, "name lookup failed");
            return Err(LookupError::no_such_host(host).into());
        }
    };
    if ips.is_empty() {
        return Err(LookupError::no_such_host(host).into());
    }
    let ip = ips
        .into_iter()
        .find(|ip| family.matches(ip))
        .ok_or_else(|| LookupError::no_address_of_family(host, family))?;
    tracing::debug!(host, %ip, "resolved");
    Ok(ip)
}
