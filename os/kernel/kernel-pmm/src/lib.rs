//! # Kernel Physical Memory Manager
//!
//! Hands out and reclaims whole 4 KiB physical frames for user address
//! spaces, kernel stacks, page tables and kernel buffers. Frames carry an
//! owner count so a single frame can back several mappings, e.g. parent and
//! child after a copy-on-write fork, without double frees or leaks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Virtual Memory Manager (caller)              │
//! │    • decides when to allocate / share / release     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │  FrameAlloc
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 FramePool                           │
//! │    • LIFO free list (index stack)                   │
//! │    • per-frame reference table                      │
//! │    • one spin lock over both                        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │  PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │    Physical RAM (HHDM / identity / hosted)          │
//! │    • poisoned on allocate and on reclaim            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! * [`FramePool`]: the allocator. `allocate`, `release`, `add_ref`.
//! * [`FrameRange`]: the managed window, start rounded up, partial tail dropped.
//! * [`PhysMapper`]: how the pool reaches frame memory to poison it.
//! * [`global`]: the kernel-wide instance built once during boot.
//! * [`hosted`]: heap-backed RAM for running the pool on a hosted target.
//!
//! ## Error Model
//!
//! * Exhaustion is not an error: [`FramePool::allocate`] returns `None`.
//! * A misaligned or foreign handle passed to [`FramePool::release`] is
//!   kernel corruption and panics; [`FramePool::try_release`] reports it as a
//!   [`FrameError`] instead.
//! * Releasing an already free frame is clamped and counted in
//!   [`PoolStats::over_releases`].
//! * Sharing a free frame is rejected with [`FrameError::NotLive`].
//!
//! ## Usage
//!
//! ```rust
//! use kernel_pmm::{FrameAlloc, FramePool, PhysicalAddress, hosted::HostedRam};
//!
//! let ram = HostedRam::new(PhysicalAddress::new(0x8000_0000), 16);
//! let pool = FramePool::new(ram.range(), ram).unwrap();
//!
//! if let Some(frame) = pool.alloc_4k() {
//!     // Use the physical frame
//!     let _ = pool.free_4k(frame);
//! }
//! assert_eq!(pool.free_frames(), 16);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod address;
mod config;
mod error;
mod free_list;
mod mapper;
mod pool;
mod range;
mod ref_table;
mod stats;

pub mod global;
pub mod hosted;

pub use address::{PhysFrame, PhysicalAddress};
pub use config::PoolConfig;
pub use error::{FrameError, PoolError, RangeError};
pub use kernel_info::memory::FRAME_SIZE;
pub use mapper::{HhdmPhysMapper, IdentityPhysMapper, PhysMapper};
pub use pool::{FramePool, Release};
pub use range::FrameRange;
pub use stats::PoolStats;

/// Frame allocator interface used by the virtual memory layer.
///
/// Implementations are internally synchronized, so all methods take `&self`.
/// Returned frames **must** be 4 KiB aligned.
pub trait FrameAlloc {
    /// Allocate one 4 KiB frame owned by the caller. `None` on out-of-memory.
    fn alloc_4k(&self) -> Option<PhysFrame>;

    /// Give up the caller's reference to `frame`.
    fn free_4k(&self, frame: PhysFrame) -> Release;

    /// Record an additional owner of a live `frame`; returns the new count.
    ///
    /// # Errors
    /// Fails if `frame` is free or not managed by this allocator.
    fn share_4k(&self, frame: PhysFrame) -> Result<u32, FrameError>;
}

impl<M: PhysMapper> FrameAlloc for FramePool<M> {
    #[inline]
    fn alloc_4k(&self) -> Option<PhysFrame> {
        self.allocate()
    }

    #[inline]
    #[track_caller]
    fn free_4k(&self, frame: PhysFrame) -> Release {
        self.release(frame)
    }

    #[inline]
    fn share_4k(&self, frame: PhysFrame) -> Result<u32, FrameError> {
        self.add_ref(frame)
    }
}

impl<A: FrameAlloc + ?Sized> FrameAlloc for &A {
    #[inline]
    fn alloc_4k(&self) -> Option<PhysFrame> {
        (**self).alloc_4k()
    }

    #[inline]
    #[track_caller]
    fn free_4k(&self, frame: PhysFrame) -> Release {
        (**self).free_4k(frame)
    }

    #[inline]
    fn share_4k(&self, frame: PhysFrame) -> Result<u32, FrameError> {
        (**self).share_4k(frame)
    }
}
