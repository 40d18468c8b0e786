use core::sync::atomic::{AtomicU64, Ordering};

/// Event counters, bumped outside the pool lock.
#[derive(Default)]
pub(crate) struct Counters {
    allocations: AtomicU64,
    exhausted: AtomicU64,
    reclaims: AtomicU64,
    shared_releases: AtomicU64,
    refs_added: AtomicU64,
    over_releases: AtomicU64,
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum Event {
    Allocated,
    Exhausted,
    Reclaimed,
    SharedRelease,
    RefAdded,
    OverReleased,
}

impl Counters {
    #[inline]
    pub(crate) fn record(&self, event: Event) {
        let counter = match event {
            Event::Allocated => &self.allocations,
            Event::Exhausted => &self.exhausted,
            Event::Reclaimed => &self.reclaims,
            Event::SharedRelease => &self.shared_releases,
            Event::RefAdded => &self.refs_added,
            Event::OverReleased => &self.over_releases,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            reclaims: self.reclaims.load(Ordering::Relaxed),
            shared_releases: self.shared_releases.load(Ordering::Relaxed),
            refs_added: self.refs_added.load(Ordering::Relaxed),
            over_releases: self.over_releases.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a pool's event counters.
///
/// Counters are relaxed and read one by one, so a snapshot taken while other
/// cores are working is not a consistent cut.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Allocations that found the free list empty.
    pub exhausted: u64,
    /// Releases that dropped the last reference (pool init not included).
    pub reclaims: u64,
    /// Releases that left other owners in place.
    pub shared_releases: u64,
    /// Successful add-reference calls.
    pub refs_added: u64,
    /// Releases of frames that were already free; the count stayed at zero.
    pub over_releases: u64,
}
