//! Kernel-wide frame pool.
//!
//! Boot code calls [`init`] once with the RAM window it discovered; after that
//! any subsystem can reach the pool through [`frame_pool`] or the forwarding
//! helpers. Code that can take the pool as a parameter should prefer
//! [`FramePool`] directly.

use crate::address::{PhysFrame, PhysicalAddress};
use crate::error::{FrameError, RangeError};
use crate::mapper::HhdmPhysMapper;
use crate::pool::{FramePool, Release, check_mapped};
use crate::range::FrameRange;
use kernel_info::memory::{PHYS_LOAD, PHYS_TOP};
use kernel_sync::SyncOnceCell;

/// The pool type used for the kernel's RAM.
pub type KernelFramePool = FramePool<HhdmPhysMapper>;

static FRAME_POOL: SyncOnceCell<KernelFramePool> = SyncOnceCell::new();

/// Build the kernel frame pool over `[start, end)`.
///
/// # Panics
/// Panics if the window is malformed or the pool was already initialized;
/// both are boot sequencing bugs.
pub fn init(
    start: PhysicalAddress,
    end: PhysicalAddress,
    mapper: HhdmPhysMapper,
) -> &'static KernelFramePool {
    let range = match FrameRange::new(start, end) {
        Ok(range) => range,
        Err(e) => panic!("frame pool init: {e}"),
    };
    install(range, mapper)
}

/// The RAM window the kernel hands to its frame pool: from the end of the
/// kernel image (never below [`PHYS_LOAD`]) up to [`PHYS_TOP`].
///
/// # Errors
/// [`RangeError::Inverted`] if `image_end` lies beyond [`PHYS_TOP`].
pub fn kernel_ram(image_end: PhysicalAddress) -> Result<FrameRange, RangeError> {
    let start = image_end.max(PhysicalAddress::new(PHYS_LOAD));
    FrameRange::new(start, PhysicalAddress::new(PHYS_TOP))
}

/// Hand [`kernel_ram`] to the kernel frame pool, reached through the direct
/// map at `HHDM_BASE`.
///
/// # Safety
/// Same as [`HhdmPhysMapper::new`]: all RAM below [`PHYS_TOP`] must be mapped
/// writable at `HHDM_BASE`, and nothing else may use the frames above
/// `image_end`.
///
/// # Panics
/// Panics if `image_end` lies beyond [`PHYS_TOP`] or the pool was already
/// initialized.
pub unsafe fn init_after_image(image_end: PhysicalAddress) -> &'static KernelFramePool {
    let range = match kernel_ram(image_end) {
        Ok(range) => range,
        Err(e) => panic!("frame pool init: {e}"),
    };
    // SAFETY: forwarded to the caller.
    install(range, unsafe { HhdmPhysMapper::new() })
}

/// Build the kernel frame pool over an already validated range.
///
/// # Panics
/// Panics if `range` ends above the mapper's [`top`](HhdmPhysMapper::top) or
/// the pool was already initialized. A rejected range leaves the global
/// uninitialized.
pub fn install(range: FrameRange, mapper: HhdmPhysMapper) -> &'static KernelFramePool {
    if let Err(e) = check_mapped(range, &mapper) {
        panic!("frame pool init: {e}");
    }
    let mut built_here = false;
    let pool = FRAME_POOL.get_or_init(|| {
        built_here = true;
        match KernelFramePool::new(range, mapper) {
            Ok(pool) => pool,
            Err(e) => panic!("frame pool init: {e}"),
        }
    });
    assert!(built_here, "frame pool initialized twice");
    pool
}

/// The kernel frame pool, if [`init`] has run.
#[inline]
#[must_use]
pub fn try_frame_pool() -> Option<&'static KernelFramePool> {
    FRAME_POOL.get()
}

/// The kernel frame pool.
///
/// # Panics
/// Panics if [`init`] has not run yet.
#[inline]
#[must_use]
pub fn frame_pool() -> &'static KernelFramePool {
    match FRAME_POOL.get() {
        Some(pool) => pool,
        None => panic!("frame pool not initialized"),
    }
}

/// Allocate one frame from the kernel pool.
#[inline]
#[must_use]
pub fn alloc_frame() -> Option<PhysFrame> {
    frame_pool().allocate()
}

/// Release one reference to a kernel frame; panics on a corrupt handle.
#[inline]
#[track_caller]
pub fn free_frame(frame: impl Into<PhysicalAddress>) -> Release {
    frame_pool().release(frame)
}

/// Add an owner to a live kernel frame.
///
/// # Errors
/// See [`FramePool::add_ref`].
#[inline]
pub fn add_frame_ref(frame: impl Into<PhysicalAddress>) -> Result<u32, FrameError> {
    frame_pool().add_ref(frame)
}
