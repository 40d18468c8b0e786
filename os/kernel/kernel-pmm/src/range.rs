//! The physical window managed by a frame pool.

use crate::address::{PhysFrame, PhysicalAddress};
use crate::error::RangeError;
use core::fmt;
use kernel_info::memory::{FRAME_SHIFT, FRAME_SIZE};

/// A run of whole frames `[first, first + frames * FRAME_SIZE)`.
///
/// Built from the raw `[start, end)` window the boot code hands over:
/// the start is rounded up to frame alignment and only frames whose full
/// extent lies below `end` are included. A trailing partial frame is not
/// part of the range.
///
/// ### Examples
/// ```rust
/// # use kernel_pmm::{FrameRange, PhysicalAddress};
/// let r = FrameRange::new(PhysicalAddress::new(0x8000_0010), PhysicalAddress::new(0x8000_3800)).unwrap();
/// assert_eq!(r.start().as_u64(), 0x8000_1000);
/// assert_eq!(r.len(), 2);
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameRange {
    first: PhysicalAddress,
    frames: usize,
}

impl FrameRange {
    /// Build the frame range covering `[start, end)`.
    ///
    /// # Errors
    /// - [`RangeError::Inverted`] if `start > end`.
    /// - [`RangeError::TooLarge`] if the frame count does not fit a `usize`.
    pub fn new(start: PhysicalAddress, end: PhysicalAddress) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }

        // Start rounded past the end (or past u64::MAX) leaves no whole frame.
        let first = match start.checked_align_up() {
            Some(first) if first <= end => first,
            _ => {
                return Ok(Self {
                    first: start.align_down(),
                    frames: 0,
                });
            }
        };

        let frames = (end.as_u64() - first.as_u64()) >> FRAME_SHIFT;
        let frames = usize::try_from(frames).map_err(|_| RangeError::TooLarge { frames })?;
        Ok(Self { first, frames })
    }

    /// Range of exactly `frames` frames starting at `first`.
    ///
    /// # Errors
    /// [`RangeError::TooLarge`] if the range does not fit the address space.
    pub fn from_frames(first: PhysFrame, frames: usize) -> Result<Self, RangeError> {
        let bytes = (frames as u64)
            .checked_mul(FRAME_SIZE)
            .ok_or(RangeError::TooLarge {
                frames: frames as u64,
            })?;
        let end = first
            .start()
            .as_u64()
            .checked_add(bytes)
            .ok_or(RangeError::TooLarge {
                frames: frames as u64,
            })?;
        Self::new(first.start(), PhysicalAddress::new(end))
    }

    /// First managed address (frame aligned).
    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.first
    }

    /// First address past the last managed frame.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.first.as_u64() + (self.frames as u64) * FRAME_SIZE)
    }

    /// Number of whole frames in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.frames
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Whether `addr` falls inside a managed frame.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        self.first <= addr && addr < self.end()
    }

    /// Table slot of the frame containing `addr`, if it is managed.
    #[inline]
    #[must_use]
    pub fn slot_of(&self, addr: PhysicalAddress) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        let slot = (addr.as_u64() - self.first.as_u64()) >> FRAME_SHIFT;
        // Bounded by `self.frames`, which is a usize.
        usize::try_from(slot).ok()
    }

    /// Frame stored in table slot `slot`.
    ///
    /// `slot` must be below [`len`](Self::len).
    #[inline]
    #[must_use]
    pub fn frame_at(&self, slot: usize) -> PhysFrame {
        debug_assert!(slot < self.frames, "slot {slot} outside {self:?}");
        PhysFrame::from_number(self.first.as_u64() / FRAME_SIZE + slot as u64)
    }

    /// All frames in ascending address order.
    #[must_use]
    pub fn frames(&self) -> impl DoubleEndedIterator<Item = PhysFrame> + ExactSizeIterator + '_ {
        (0..self.frames).map(|slot| self.frame_at(slot))
    }
}

impl fmt::Debug for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FrameRange(0x{:016X}..0x{:016X}, {} frames)",
            self.first.as_u64(),
            self.end().as_u64(),
            self.frames
        )
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.first, self.end())
    }
}
