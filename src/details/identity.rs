use crate::{PingError, PingResult};
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

// Identifier 0 is never handed out: a datagram socket bound to port 0 gets a kernel chosen port.
const IDENTITY_SPACE: u32 = 65_535;

/// Hands out ICMP echo identifiers that are unique among the leases alive at the same time.
///
/// Clones share the same pool. [`IdentityAllocator::global`] is the process wide pool every
/// pinger uses unless another one is injected.
#[derive(Clone)]
pub struct IdentityAllocator {
    in_use: Arc<Mutex<HashSet<u16>>>,
    space: u32,
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self::with_space(IDENTITY_SPACE)
    }
}

impl IdentityAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool limited to the identifiers `1..=space`.
    pub(crate) fn with_space(space: u32) -> Self {
        IdentityAllocator { in_use: Arc::new(Mutex::new(HashSet::new())), space: space.clamp(1, IDENTITY_SPACE) }
    }

    pub fn global() -> &'static IdentityAllocator {
        static GLOBAL: OnceLock<IdentityAllocator> = OnceLock::new();
        GLOBAL.get_or_init(IdentityAllocator::new)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u16>> {
        self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leases a free identifier, starting the search at a random point.
    pub fn allocate(&self) -> PingResult<Identity> {
        let mut in_use = self.lock();
        let start = rand::thread_rng().gen_range(0..self.space);
        let value = (0..self.space)
            .filter_map(|offset| u16::try_from((start + offset) % self.space + 1).ok())
            .find(|candidate| !in_use.contains(candidate))
            .ok_or(PingError::ResourceExhausted)?;
        in_use.insert(value);
        tracing::trace!(identity = value, "identity allocated");
        Ok(Identity { value, allocator: self.clone() })
    }

    /// Returns the identifier to the pool. Dropping the lease does the same.
    pub fn release(&self, identity: Identity) {
        drop(identity);
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.lock().len()
    }
}

/// A leased identifier; released when dropped.
pub struct Identity {
    value: u16,
    allocator: IdentityAllocator,
}

impl Identity {
    #[must_use]
    pub fn value(&self) -> u16 {
        self.value
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Identity").field(&self.value).finish()
    }
}

impl Drop for Identity {
    fn drop(&mut self) {
        self.allocator.lock().remove(&self.value);
        tracing::trace!(identity = self.value, "identity released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn identities_are_unique_while_leased() {
        let allocator = IdentityAllocator::new();
        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_ne!(a.value(), b.value());
        assert_eq!(2, allocator.in_use());
    }

    #[test]
    fn release_returns_identity_to_pool() {
        let allocator = IdentityAllocator::new();
        let identity = allocator.allocate().unwrap();
        allocator.release(identity);
        assert_eq!(0, allocator.in_use());

        let dropped = allocator.allocate().unwrap();
        drop(dropped);
        assert_eq!(0, allocator.in_use());
    }

    #[test]
    fn exhaustion_is_reported() {
        let allocator = IdentityAllocator::with_space(16);
        let leases: Vec<Identity> = (0..16).map(|_| allocator.allocate().unwrap()).collect();
        let distinct: HashSet<u16> = leases.iter().map(Identity::value).collect();
        assert_eq!((1..=16).collect::<HashSet<u16>>(), distinct);
        assert!(matches!(allocator.allocate(), Err(PingError::ResourceExhausted)));

        drop(leases);
        assert!(allocator.allocate().is_ok());
    }

    #[test]
    fn concurrent_allocation_never_hands_out_duplicates() {
        let allocator = IdentityAllocator::new();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                thread::spawn(move || (0..200).map(|_| allocator.allocate().unwrap()).collect::<Vec<_>>())
            })
            .collect();
        let leases: Vec<Identity> = workers.into_iter().flat_map(|w| w.join().unwrap()).collect();

        let distinct: HashSet<u16> = leases.iter().map(Identity::value).collect();
        assert_eq!(1600, distinct.len());
    }
}
