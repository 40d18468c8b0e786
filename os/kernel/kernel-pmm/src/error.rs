use crate::address::PhysicalAddress;
use crate::range::FrameRange;

/// The raw window handed to [`FrameRange::new`] is unusable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("inverted physical range {start}..{end}")]
    Inverted {
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("physical range of {frames} frames cannot be indexed")]
    TooLarge { frames: u64 },
}

/// A frame pool could not be constructed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("allocation and release fill are both {0:#04x}")]
    IdenticalFill(u8),
    #[error("range {range} ends above the mapped limit {limit}")]
    Unmapped {
        range: FrameRange,
        limit: PhysicalAddress,
    },
}

/// A frame handle was rejected by [`FramePool`](crate::FramePool).
///
/// `Misaligned` and `OutOfRange` on release indicate kernel corruption and are
/// escalated to a panic by [`FramePool::release`](crate::FramePool::release).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("{0} is not frame aligned")]
    Misaligned(PhysicalAddress),
    #[error("{addr} is outside the managed range {range}")]
    OutOfRange {
        addr: PhysicalAddress,
        range: FrameRange,
    },
    #[error("frame {0} is free")]
    NotLive(PhysicalAddress),
    #[error("reference count of frame {0} would overflow")]
    RefCountOverflow(PhysicalAddress),
}

impl FrameError {
    /// The handle that was rejected.
    #[must_use]
    pub const fn address(&self) -> PhysicalAddress {
        match *self {
            Self::Misaligned(addr)
            | Self::OutOfRange { addr, .. }
            | Self::NotLive(addr)
            | Self::RefCountOverflow(addr) => addr,
        }
    }

    /// Whether this is a corrupted handle rather than a frame-state problem.
    #[must_use]
    pub const fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::Misaligned(_) | Self::OutOfRange { .. })
    }
}
