//! # Reference-counted frame pool
//!
//! [`FramePool`] owns a fixed physical window and hands out whole 4 KiB
//! frames. Frames can be shared between several owners (e.g. parent and child
//! after a copy-on-write fork); a frame goes back to the free list exactly
//! when its last owner releases it.
//!
//! ## Frame life cycle
//!
//! ```text
//!            allocate              add_ref
//!  FREE(0) ───────────► LIVE(1) ───────────► LIVE(k)
//!     ▲                    │                    │
//!     └──── release ───────┘◄─── release ───────┘
//!     (last owner: poison + push)   (k > 1: count only)
//! ```
//!
//! ## Locking
//!
//! One spin lock guards the free list *and* every reference count, so a
//! concurrent `add_ref` and `release` on the same frame cannot lose an update.
//! The release poison is written under the lock before the frame is pushed;
//! the allocation poison is written after the lock is dropped, when the
//! caller is already the sole owner.

use crate::address::{PhysFrame, PhysicalAddress};
use crate::config::PoolConfig;
use crate::error::{FrameError, PoolError};
use crate::free_list::FreeList;
use crate::mapper::PhysMapper;
use crate::range::FrameRange;
use crate::ref_table::{RefDrop, RefTable};
use crate::stats::{Counters, Event, PoolStats};
use core::fmt;
use kernel_info::memory::FRAME_SIZE;
use kernel_sync::SpinLock;
use log::{debug, error, info, trace, warn};

#[allow(clippy::cast_possible_truncation)]
const FRAME_BYTES: usize = FRAME_SIZE as usize;

/// Outcome of releasing one reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub enum Release {
    /// Other owners remain; the frame was left untouched.
    Shared { remaining: u32 },
    /// That was the last owner; the frame was poisoned and is free again.
    Reclaimed,
    /// The frame was already free. The count stays at zero and the free list
    /// is not touched.
    OverReleased,
}

impl Release {
    #[must_use]
    pub const fn reclaimed(self) -> bool {
        matches!(self, Self::Reclaimed)
    }
}

/// State guarded by the pool lock.
struct PoolState {
    free: FreeList,
    refs: RefTable,
}

/// Physical frame allocator with per-frame reference counts.
///
/// Construct one per managed window and share it by reference; all operations
/// take `&self` and are safe to call from any core.
///
/// # Example
/// ```rust
/// use kernel_pmm::{FramePool, PhysicalAddress, Release, hosted::HostedRam};
///
/// let ram = HostedRam::new(PhysicalAddress::new(0x8000_0000), 4);
/// let pool = FramePool::new(ram.range(), ram).unwrap();
///
/// let frame = pool.allocate().expect("pool has frames");
/// assert_eq!(pool.add_ref(frame), Ok(2));
/// assert_eq!(pool.release(frame), Release::Shared { remaining: 1 });
/// assert_eq!(pool.release(frame), Release::Reclaimed);
/// assert_eq!(pool.free_frames(), 4);
/// ```
pub struct FramePool<M: PhysMapper> {
    range: FrameRange,
    config: PoolConfig,
    mapper: M,
    state: SpinLock<PoolState>,
    counters: Counters,
}

impl<M: PhysMapper> FramePool<M> {
    /// Build a pool over `range` with the default poison bytes.
    ///
    /// Every frame of the range is poisoned with the release fill and pushed
    /// onto the free list in ascending order, so the highest frame is handed
    /// out first.
    ///
    /// # Errors
    /// See [`with_config`](Self::with_config).
    pub fn new(range: FrameRange, mapper: M) -> Result<Self, PoolError> {
        Self::with_config(range, mapper, PoolConfig::default())
    }

    /// Build a pool over the raw window `[start, end)`.
    ///
    /// The start is rounded up to a frame boundary; a trailing partial frame
    /// is ignored.
    ///
    /// # Errors
    /// [`PoolError::Range`] for an inverted or unindexable window.
    pub fn from_bounds(
        start: PhysicalAddress,
        end: PhysicalAddress,
        mapper: M,
    ) -> Result<Self, PoolError> {
        Self::new(FrameRange::new(start, end)?, mapper)
    }

    /// Build a pool over `range` with explicit poison bytes.
    ///
    /// # Errors
    /// - [`PoolError::IdenticalFill`] if both fills are equal.
    /// - [`PoolError::Unmapped`] if `range` ends above the mapper's
    ///   [`phys_limit`](PhysMapper::phys_limit); nothing is written then.
    pub fn with_config(
        range: FrameRange,
        mapper: M,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        check_mapped(range, &mapper)?;

        let mut free = FreeList::with_capacity(range.len());
        for (slot, frame) in range.frames().enumerate() {
            // SAFETY: the caller hands us the range; nobody else owns it yet.
            unsafe { Self::fill(&mapper, frame, config.release_fill()) };
            free.push(slot);
        }

        info!(
            "frame pool: {} frames ({} KiB) at {range}",
            range.len(),
            range.len() as u64 * FRAME_SIZE / 1024
        );

        Ok(Self {
            range,
            config,
            mapper,
            state: SpinLock::new(PoolState {
                free,
                refs: RefTable::new(range.len()),
            }),
            counters: Counters::default(),
        })
    }

    /// Take one frame off the free list.
    ///
    /// The frame comes back with a reference count of exactly one and every
    /// byte set to the allocation fill. Returns `None` when the pool is
    /// exhausted; callers decide how to fail.
    #[must_use]
    pub fn allocate(&self) -> Option<PhysFrame> {
        let slot = {
            let mut state = self.state.lock();
            let slot = state.free.pop();
            if let Some(slot) = slot {
                state.refs.claim(slot);
            }
            slot
        };

        let Some(slot) = slot else {
            self.counters.record(Event::Exhausted);
            debug!("frame pool exhausted ({} frames)", self.range.len());
            return None;
        };

        let frame = self.range.frame_at(slot);
        // SAFETY: just popped; the caller is the only owner.
        unsafe { Self::fill(&self.mapper, frame, self.config.alloc_fill()) };
        self.counters.record(Event::Allocated);
        trace!("alloc {frame}");
        Some(frame)
    }

    /// Drop one reference to `frame`, reclaiming it if it was the last.
    ///
    /// # Panics
    /// A misaligned handle or one outside the managed range means the caller
    /// has corrupted kernel state. This logs the error and panics; use
    /// [`try_release`](Self::try_release) to get the error as a value.
    #[track_caller]
    pub fn release(&self, frame: impl Into<PhysicalAddress>) -> Release {
        match self.try_release(frame) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("release: {e}");
                panic!("release: {e}");
            }
        }
    }

    /// Drop one reference to `frame`, reclaiming it if it was the last.
    ///
    /// On reclaim the whole frame is overwritten with the release fill before
    /// it becomes allocatable again. Releasing a frame that is already free is
    /// clamped: nothing changes except the over-release counter.
    ///
    /// An over-release deliberately skips the fill and the push that a clamped
    /// count would otherwise lead to. A free frame is already on the free
    /// list, and pushing it again would let two callers allocate it.
    ///
    /// # Errors
    /// [`FrameError::Misaligned`] or [`FrameError::OutOfRange`] for a bad
    /// handle; the pool is left unchanged.
    pub fn try_release(&self, frame: impl Into<PhysicalAddress>) -> Result<Release, FrameError> {
        let addr = frame.into();
        let slot = self.slot(addr)?;
        let frame = self.range.frame_at(slot);

        let outcome = {
            let mut state = self.state.lock();
            match state.refs.drop_ref(slot) {
                RefDrop::Shared { remaining } => Release::Shared { remaining },
                RefDrop::Last => {
                    // SAFETY: count hit zero under the lock; nobody owns the frame.
                    unsafe { Self::fill(&self.mapper, frame, self.config.release_fill()) };
                    state.free.push(slot);
                    Release::Reclaimed
                }
                RefDrop::Clamped => Release::OverReleased,
            }
        };

        match outcome {
            Release::Shared { remaining } => {
                self.counters.record(Event::SharedRelease);
                trace!("release {frame}: {remaining} owners left");
            }
            Release::Reclaimed => {
                self.counters.record(Event::Reclaimed);
                trace!("free {frame}");
            }
            Release::OverReleased => {
                self.counters.record(Event::OverReleased);
                warn!("release of free frame {frame}; count clamped at zero");
            }
        }
        Ok(outcome)
    }

    /// Record one more owner of a live frame and return the new count.
    ///
    /// # Errors
    /// - [`FrameError::Misaligned`] / [`FrameError::OutOfRange`] for a bad handle.
    /// - [`FrameError::NotLive`] if the frame is on the free list.
    /// - [`FrameError::RefCountOverflow`] if the count is saturated.
    pub fn add_ref(&self, frame: impl Into<PhysicalAddress>) -> Result<u32, FrameError> {
        let addr = frame.into();
        let slot = self.slot(addr)?;

        let shared = {
            let mut state = self.state.lock();
            match state.refs.share(slot) {
                Some(count) => Ok(count),
                None if state.refs.get(slot) == 0 => Err(FrameError::NotLive(addr)),
                None => Err(FrameError::RefCountOverflow(addr)),
            }
        };

        match shared {
            Ok(count) => {
                self.counters.record(Event::RefAdded);
                trace!("share {addr}: {count} owners");
            }
            Err(e) => warn!("add_ref: {e}"),
        }
        shared
    }

    /// Current owner count of `frame`; zero means it is free.
    ///
    /// # Errors
    /// [`FrameError::Misaligned`] / [`FrameError::OutOfRange`] for a bad handle.
    pub fn ref_count(&self, frame: impl Into<PhysicalAddress>) -> Result<u32, FrameError> {
        let slot = self.slot(frame.into())?;
        Ok(self.state.lock().refs.get(slot))
    }

    /// Frames currently on the free list.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Frames with at least one owner.
    #[must_use]
    pub fn live_frames(&self) -> usize {
        self.range.len() - self.free_frames()
    }

    /// Frames managed by this pool.
    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.range.len()
    }

    /// The frame the next [`allocate`](Self::allocate) would hand out.
    #[must_use]
    pub fn peek_free(&self) -> Option<PhysFrame> {
        let slot = self.state.lock().free.peek()?;
        Some(self.range.frame_at(slot))
    }

    #[inline]
    #[must_use]
    pub const fn range(&self) -> FrameRange {
        self.range
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        self.range.contains(addr)
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Validate a handle and turn it into a table slot.
    fn slot(&self, addr: PhysicalAddress) -> Result<usize, FrameError> {
        if !addr.is_frame_aligned() {
            return Err(FrameError::Misaligned(addr));
        }
        self.range.slot_of(addr).ok_or(FrameError::OutOfRange {
            addr,
            range: self.range,
        })
    }

    /// Overwrite all of `frame` with `byte`.
    ///
    /// # Safety
    /// The caller must be the only party accessing `frame`.
    #[inline]
    unsafe fn fill(mapper: &M, frame: PhysFrame, byte: u8) {
        let ptr = mapper.frame_ptr(frame);
        // SAFETY: PhysMapper guarantees FRAME_SIZE writable bytes; exclusivity
        // is up to the caller.
        unsafe { core::ptr::write_bytes(ptr, byte, FRAME_BYTES) }
    }
}

/// Reject a non-empty `range` that ends above what `mapper` can reach.
pub(crate) fn check_mapped<M: PhysMapper>(range: FrameRange, mapper: &M) -> Result<(), PoolError> {
    match mapper.phys_limit() {
        Some(limit) if !range.is_empty() && range.end() > limit => {
            Err(PoolError::Unmapped { range, limit })
        }
        _ => Ok(()),
    }
}

impl<M: PhysMapper> fmt::Debug for FramePool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("range", &self.range)
            .field("free", &self.free_frames())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted::HostedRam;

    const BASE: u64 = 0x8000_0000;

    fn pool(frames: usize) -> FramePool<HostedRam> {
        let ram = HostedRam::new(PhysicalAddress::new(BASE), frames);
        FramePool::new(ram.range(), ram).unwrap()
    }

    fn frame(n: u64) -> PhysFrame {
        PhysFrame::from_start(PhysicalAddress::new(BASE + n * FRAME_SIZE)).unwrap()
    }

    #[test]
    fn init_lists_every_frame_highest_first() {
        let p = pool(3);
        assert_eq!(p.total_frames(), 3);
        assert_eq!(p.free_frames(), 3);
        assert_eq!(p.peek_free(), Some(frame(2)));
        for n in 0..3 {
            assert_eq!(p.ref_count(frame(n)), Ok(0));
            assert!(unsafe { p.mapper().is_filled_with(frame(n), 0x01) });
        }
        assert_eq!(p.stats(), PoolStats::default());
    }

    #[test]
    fn allocate_sets_count_and_poisons() {
        let p = pool(2);
        let f = p.allocate().unwrap();
        assert_eq!(f, frame(1));
        assert_eq!(p.ref_count(f), Ok(1));
        assert!(unsafe { p.mapper().is_filled_with(f, 0x05) });
        assert_eq!(p.free_frames(), 1);
        assert_eq!(p.live_frames(), 1);
    }

    #[test]
    fn exhaustion_returns_none_and_is_counted() {
        let p = pool(1);
        assert!(p.allocate().is_some());
        assert!(p.allocate().is_none());
        assert!(p.allocate().is_none());
        let s = p.stats();
        assert_eq!((s.allocations, s.exhausted), (1, 2));
    }

    #[test]
    fn shared_release_leaves_contents_alone() {
        let p = pool(1);
        let f = p.allocate().unwrap();
        unsafe { p.mapper().write(f, 0, b"page data") };
        assert_eq!(p.add_ref(f), Ok(2));

        assert_eq!(p.release(f), Release::Shared { remaining: 1 });
        assert_eq!(unsafe { &p.mapper().frame_bytes(f)[..9] }, b"page data");
        assert_eq!(p.free_frames(), 0);

        assert!(p.release(f).reclaimed());
        assert!(unsafe { p.mapper().is_filled_with(f, 0x01) });
        assert_eq!(p.free_frames(), 1);
    }

    #[test]
    fn over_release_is_clamped_and_observable() {
        let p = pool(2);
        let f = p.allocate().unwrap();
        assert!(p.release(f).reclaimed());
        unsafe { p.mapper().write(f, 0, b"stale") };
        assert_eq!(p.release(f), Release::OverReleased);
        assert_eq!(p.ref_count(f), Ok(0));
        // No refill either.
        assert_eq!(unsafe { &p.mapper().frame_bytes(f)[..5] }, b"stale");
        // Not pushed twice.
        assert_eq!(p.free_frames(), 2);
        assert_eq!(p.stats().over_releases, 1);

        let a = p.allocate().unwrap();
        let b = p.allocate().unwrap();
        assert_ne!(a, b);
        assert!(p.allocate().is_none());
    }

    #[test]
    fn add_ref_on_free_frame_is_rejected() {
        let p = pool(1);
        let f = frame(0);
        assert_eq!(p.add_ref(f), Err(FrameError::NotLive(f.start())));
        assert_eq!(p.ref_count(f), Ok(0));
        assert_eq!(p.stats().refs_added, 0);
    }

    #[test]
    fn bad_handles_are_rejected_without_side_effects() {
        let p = pool(2);
        let live = p.allocate().unwrap();

        let misaligned = PhysicalAddress::new(BASE + 8);
        assert_eq!(p.try_release(misaligned), Err(FrameError::Misaligned(misaligned)));
        assert_eq!(p.add_ref(misaligned), Err(FrameError::Misaligned(misaligned)));

        for outside in [BASE - FRAME_SIZE, BASE + 2 * FRAME_SIZE] {
            let addr = PhysicalAddress::new(outside);
            let err = p.try_release(addr).unwrap_err();
            assert!(err.is_invalid_handle());
            assert_eq!(err.address(), addr);
            assert_eq!(
                err,
                FrameError::OutOfRange {
                    addr,
                    range: p.range()
                }
            );
        }

        assert_eq!(p.ref_count(live), Ok(1));
        assert_eq!(p.free_frames(), 1);
    }

    #[test]
    #[should_panic(expected = "not frame aligned")]
    fn release_of_misaligned_handle_panics() {
        let p = pool(1);
        let _ = p.release(PhysicalAddress::new(BASE + 1));
    }

    #[test]
    #[should_panic(expected = "outside the managed range")]
    fn release_outside_range_panics() {
        let p = pool(1);
        let _ = p.release(PhysicalAddress::new(BASE + FRAME_SIZE));
    }

    #[test]
    fn custom_fill_bytes_are_used() {
        let ram = HostedRam::new(PhysicalAddress::new(BASE), 1);
        let config = PoolConfig::new().with_alloc_fill(0xAA).with_release_fill(0xDD);
        let p = FramePool::with_config(ram.range(), ram, config).unwrap();
        assert!(unsafe { p.mapper().is_filled_with(frame(0), 0xDD) });
        let f = p.allocate().unwrap();
        assert!(unsafe { p.mapper().is_filled_with(f, 0xAA) });
    }

    #[test]
    fn identical_fill_bytes_are_rejected() {
        let ram = HostedRam::new(PhysicalAddress::new(BASE), 1);
        let config = PoolConfig::new().with_alloc_fill(0).with_release_fill(0);
        let err = FramePool::with_config(ram.range(), ram, config).unwrap_err();
        assert_eq!(err, PoolError::IdenticalFill(0));
    }

    #[test]
    fn range_past_mapper_limit_is_rejected_untouched() {
        let ram = HostedRam::new(PhysicalAddress::new(BASE), 2);
        let mapper = unsafe { ram.hhdm_mapper() };
        let range = FrameRange::from_frames(frame(0), 3).unwrap();

        let err = FramePool::new(range, mapper).unwrap_err();
        assert_eq!(
            err,
            PoolError::Unmapped {
                range,
                limit: ram.range().end()
            }
        );
        for n in 0..2 {
            assert!(unsafe { ram.is_filled_with(frame(n), 0) });
        }
    }

    #[test]
    fn kernel_direct_map_stops_at_phys_top() {
        use crate::mapper::HhdmPhysMapper;
        use kernel_info::memory::PHYS_TOP;

        let mapper = unsafe { HhdmPhysMapper::new() };
        for (start, end) in [
            (PHYS_TOP, PHYS_TOP + 2 * FRAME_SIZE),
            (PHYS_TOP - FRAME_SIZE, PHYS_TOP + FRAME_SIZE),
        ] {
            let err = FramePool::from_bounds(
                PhysicalAddress::new(start),
                PhysicalAddress::new(end),
                mapper,
            )
            .unwrap_err();
            assert!(matches!(err, PoolError::Unmapped { limit, .. } if limit.as_u64() == PHYS_TOP));
        }
    }

    #[test]
    fn empty_pool_is_always_exhausted() {
        let ram = HostedRam::new(PhysicalAddress::new(BASE), 0);
        let p = FramePool::new(ram.range(), ram).unwrap();
        assert_eq!(p.total_frames(), 0);
        assert!(p.allocate().is_none());
        assert!(p.try_release(PhysicalAddress::new(BASE)).is_err());
    }
}
