//! # Physical frame access
//!
//! The pool poisons frames on allocation and reclaim, which means it has to
//! write to physical memory. Code can only dereference virtual addresses, so
//! the translation is delegated to a [`PhysMapper`]:
//!
//! - **Kernel**: higher-half direct map, `va = HHDM_BASE + pa`
//!   ([`HhdmPhysMapper`]).
//! - **Early boot / identity-mapped low memory**: `va = pa`
//!   ([`IdentityPhysMapper`]).
//! - **Hosted tests**: heap-backed RAM ([`HostedRam`](crate::hosted::HostedRam)).

use crate::address::{PhysFrame, PhysicalAddress};
use kernel_info::memory::{HHDM_BASE, PHYS_TOP};

/// Converts a physical frame into a writable pointer in the current address
/// space.
///
/// # Safety
/// Implementors guarantee that for every frame of the pool's managed range,
/// [`frame_ptr`](Self::frame_ptr) returns a pointer valid for reads and writes
/// of `FRAME_SIZE` bytes for as long as the mapper lives, and that distinct
/// frames never alias.
pub unsafe trait PhysMapper: Sync {
    /// Pointer to the first byte of `frame`.
    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8;

    /// Exclusive upper bound of the physical memory this mapper reaches, if
    /// it has one. Pools refuse ranges that end above it.
    fn phys_limit(&self) -> Option<PhysicalAddress> {
        None
    }
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
///
/// Converts a physical address to a pointer by adding a fixed offset. The
/// offset is [`HHDM_BASE`] in the kernel; hosted simulations may place the
/// window elsewhere. Only physical memory below [`top`](Self::top) is
/// reachable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HhdmPhysMapper {
    offset: u64,
    top: PhysicalAddress,
}

impl HhdmPhysMapper {
    /// Mapper for the kernel's direct map of `[0, PHYS_TOP)` at [`HHDM_BASE`].
    ///
    /// # Safety
    /// The kernel page tables must map all physical memory below
    /// [`PHYS_TOP`] writable at [`HHDM_BASE`], and the frames handed to a
    /// pool must not be used by anything else.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self {
            offset: HHDM_BASE,
            top: PhysicalAddress::new(PHYS_TOP),
        }
    }

    /// Mapper for a direct map of `[0, top)` at `offset`.
    ///
    /// # Safety
    /// `offset + pa` must be mapped and writable for every frame below `top`
    /// that a pool manages, and nothing else may use that memory.
    #[must_use]
    pub const unsafe fn with_offset(offset: u64, top: PhysicalAddress) -> Self {
        Self { offset, top }
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// First physical address not covered by the direct map.
    #[inline]
    #[must_use]
    pub const fn top(&self) -> PhysicalAddress {
        self.top
    }
}

// SAFETY: promised by `new` / `with_offset` for every frame below `top`;
// pools reject ranges above `phys_limit`.
unsafe impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8 {
        let va = self.offset.wrapping_add(frame.start().as_u64());
        #[allow(clippy::cast_possible_truncation)]
        let va = va as usize;
        core::ptr::with_exposed_provenance_mut(va)
    }

    #[inline]
    fn phys_limit(&self) -> Option<PhysicalAddress> {
        Some(self.top)
    }
}

/// [`PhysMapper`] for identity-mapped physical memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IdentityPhysMapper(());

impl IdentityPhysMapper {
    /// # Safety
    /// Every frame handed to the pool must be identity mapped and writable.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

// SAFETY: promised by `IdentityPhysMapper::new`.
unsafe impl PhysMapper for IdentityPhysMapper {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8 {
        core::ptr::with_exposed_provenance_mut(frame.start().as_u64() as usize)
    }
}
