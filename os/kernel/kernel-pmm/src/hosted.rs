//! Heap-backed stand-in for physical RAM.
//!
//! Lets the pool run on a hosted target (unit tests, simulations): a block of
//! heap memory pretends to be the physical window `[base, base + frames * 4K)`.

use crate::address::{PhysFrame, PhysicalAddress};
use crate::mapper::{HhdmPhysMapper, PhysMapper};
use crate::range::FrameRange;
use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use core::ptr::NonNull;
use kernel_info::memory::FRAME_SIZE;

#[allow(clippy::cast_possible_truncation)]
const FRAME_BYTES: usize = FRAME_SIZE as usize;

/// Zero-initialized, frame-aligned heap memory posing as physical RAM.
pub struct HostedRam {
    base: PhysFrame,
    frames: usize,
    mem: NonNull<u8>,
}

// SAFETY: the block is uniquely owned; concurrent access to distinct frames
// is the pool's business, same as with real RAM.
unsafe impl Send for HostedRam {}
unsafe impl Sync for HostedRam {}

impl HostedRam {
    /// Reserve `frames` frames of RAM that claim to start at physical `base`.
    ///
    /// # Panics
    /// Panics if `base` is not frame aligned or the size overflows.
    #[must_use]
    pub fn new(base: PhysicalAddress, frames: usize) -> Self {
        let Some(base) = PhysFrame::from_start(base) else {
            panic!("hosted RAM base {base} is not frame aligned");
        };

        if frames == 0 {
            return Self {
                base,
                frames,
                mem: NonNull::dangling(),
            };
        }

        let layout = Self::layout(frames);
        // SAFETY: layout has a non-zero size.
        let Some(mem) = NonNull::new(unsafe { alloc_zeroed(layout) }) else {
            handle_alloc_error(layout)
        };
        Self { base, frames, mem }
    }

    fn layout(frames: usize) -> Layout {
        let size = frames
            .checked_mul(FRAME_BYTES)
            .unwrap_or_else(|| panic!("hosted RAM of {frames} frames overflows"));
        match Layout::from_size_align(size, FRAME_BYTES) {
            Ok(layout) => layout,
            Err(e) => panic!("hosted RAM layout: {e}"),
        }
    }

    /// The whole simulated window as a frame range.
    ///
    /// # Panics
    /// Panics if the window does not fit the physical address space.
    #[must_use]
    pub fn range(&self) -> FrameRange {
        match FrameRange::from_frames(self.base, self.frames) {
            Ok(range) => range,
            Err(e) => panic!("hosted RAM: {e}"),
        }
    }

    /// A direct-map mapper that resolves into this block.
    ///
    /// # Safety
    /// The returned mapper must not outlive `self`.
    #[must_use]
    pub unsafe fn hhdm_mapper(&self) -> HhdmPhysMapper {
        let offset = (self.mem.as_ptr().expose_provenance() as u64)
            .wrapping_sub(self.base.start().as_u64());
        // SAFETY: offset + pa lands inside the block for every frame of `range()`.
        unsafe { HhdmPhysMapper::with_offset(offset, self.range().end()) }
    }

    fn slot(&self, frame: PhysFrame) -> usize {
        match self.range().slot_of(frame.start()) {
            Some(slot) => slot,
            None => panic!("frame {frame} is outside hosted RAM {:?}", self.range()),
        }
    }

    /// Contents of `frame`.
    ///
    /// # Safety
    /// Nobody may write to `frame` while the returned slice is alive.
    ///
    /// # Panics
    /// Panics if `frame` is not part of this RAM.
    #[must_use]
    pub unsafe fn frame_bytes(&self, frame: PhysFrame) -> &[u8] {
        let ptr = self.frame_ptr(frame);
        unsafe { core::slice::from_raw_parts(ptr, FRAME_BYTES) }
    }

    /// Copy `data` into `frame` at `offset`.
    ///
    /// # Safety
    /// The caller must own `frame` (hold a reference obtained from the pool).
    ///
    /// # Panics
    /// Panics if `frame` is not part of this RAM or the write crosses the frame end.
    pub unsafe fn write(&self, frame: PhysFrame, offset: usize, data: &[u8]) {
        assert!(
            offset.checked_add(data.len()).is_some_and(|end| end <= FRAME_BYTES),
            "write of {} bytes at {offset} crosses the end of {frame}",
            data.len()
        );
        let ptr = self.frame_ptr(frame);
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset), data.len()) }
    }

    /// Whether every byte of `frame` equals `byte`.
    ///
    /// # Safety
    /// Same as [`frame_bytes`](Self::frame_bytes).
    #[must_use]
    pub unsafe fn is_filled_with(&self, frame: PhysFrame, byte: u8) -> bool {
        unsafe { self.frame_bytes(frame) }.iter().all(|&b| b == byte)
    }
}

// SAFETY: every frame of `range()` maps to its own FRAME_SIZE slice of the
// block; frames outside the block are rejected with a panic.
unsafe impl PhysMapper for HostedRam {
    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8 {
        let slot = self.slot(frame);
        // SAFETY: slot < frames, so the offset stays inside the allocation.
        unsafe { self.mem.as_ptr().add(slot * FRAME_BYTES) }
    }

    fn phys_limit(&self) -> Option<PhysicalAddress> {
        Some(self.range().end())
    }
}

impl Drop for HostedRam {
    fn drop(&mut self) {
        if self.frames != 0 {
            // SAFETY: allocated in `new` with the same layout.
            unsafe { dealloc(self.mem.as_ptr(), Self::layout(self.frames)) }
        }
    }
}

impl core::fmt::Debug for HostedRam {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostedRam")
            .field("range", &self.range())
            .finish_non_exhaustive()
    }
}
