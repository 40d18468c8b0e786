use core::fmt;
use kernel_info::memory::{FRAME_SHIFT, FRAME_SIZE};

/// Physical memory address.
///
/// A raw, possibly unaligned physical address. This is the handle type the
/// pool accepts when releasing or sharing a frame, so that misaligned handles
/// can be detected rather than silently rounded.
///
/// ### Examples
/// ```rust
/// # use kernel_pmm::PhysicalAddress;
/// let pa = PhysicalAddress::new(0x8000_1042);
/// assert!(!pa.is_frame_aligned());
/// assert_eq!(pa.align_down().as_u64(), 0x8000_1000);
/// assert_eq!(pa.align_up().as_u64(), 0x8000_2000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_frame_aligned(self) -> bool {
        self.0 & (FRAME_SIZE - 1) == 0
    }

    /// Offset of this address inside its frame.
    #[inline]
    #[must_use]
    pub const fn frame_offset(self) -> u64 {
        self.0 & (FRAME_SIZE - 1)
    }

    #[inline]
    #[must_use]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !(FRAME_SIZE - 1))
    }

    /// Round up to the next frame boundary, or `None` if that overflows.
    #[inline]
    #[must_use]
    pub const fn checked_align_up(self) -> Option<Self> {
        match self.0.checked_add(FRAME_SIZE - 1) {
            Some(v) => Some(Self(v & !(FRAME_SIZE - 1))),
            None => None,
        }
    }

    /// Round up to the next frame boundary.
    ///
    /// # Panics
    /// Panics if the result does not fit in 64 bits.
    #[inline]
    #[must_use]
    pub const fn align_up(self) -> Self {
        match self.checked_align_up() {
            Some(v) => v,
            None => panic!("physical address overflow"),
        }
    }

    /// The frame containing this address.
    #[inline]
    #[must_use]
    pub const fn containing_frame(self) -> PhysFrame {
        PhysFrame(self.align_down())
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(a: PhysicalAddress) -> Self {
        a.as_u64()
    }
}

/// One 4 KiB physical page frame.
///
/// ### Invariants
/// - The base address is always a multiple of [`FRAME_SIZE`].
///
/// ### Examples
/// ```rust
/// # use kernel_pmm::{PhysFrame, PhysicalAddress};
/// let frame = PhysFrame::from_start(PhysicalAddress::new(0x8000_3000)).unwrap();
/// assert_eq!(frame.number(), 0x8_0003);
/// assert!(PhysFrame::from_start(PhysicalAddress::new(0x8000_3004)).is_none());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysFrame(PhysicalAddress);

impl PhysFrame {
    /// Frame starting at `addr`, or `None` if `addr` is not frame aligned.
    #[inline]
    #[must_use]
    pub const fn from_start(addr: PhysicalAddress) -> Option<Self> {
        if addr.is_frame_aligned() {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Frame with the given frame number (`address / FRAME_SIZE`).
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(PhysicalAddress::new(number << FRAME_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn start(self) -> PhysicalAddress {
        self.0
    }

    /// First address past this frame.
    #[inline]
    #[must_use]
    pub const fn end(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0.as_u64() + FRAME_SIZE)
    }

    /// Frame number, i.e. `start / FRAME_SIZE`.
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0.as_u64() >> FRAME_SHIFT
    }
}

impl fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysFrame(0x{:016X})", self.0.as_u64())
    }
}

impl fmt::Display for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/4K", self.0.as_u64())
    }
}

impl From<PhysFrame> for PhysicalAddress {
    #[inline]
    fn from(frame: PhysFrame) -> Self {
        frame.start()
    }
}
