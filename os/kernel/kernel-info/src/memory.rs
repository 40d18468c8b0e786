//! # Memory Layout

/// Size of one physical page frame.
pub const FRAME_SIZE: u64 = 4096;

/// log2([`FRAME_SIZE`]).
pub const FRAME_SHIFT: u32 = 12;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything mapped at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel image is placed in *physical* memory.
///
/// Frames below the end of the image are never handed to the frame pool;
/// the boot code passes the image end (rounded up by the pool) as the
/// start of the managed range.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Exclusive upper bound of RAM handed to the frame pool.
pub const PHYS_TOP: u64 = PHYS_LOAD + 512 * 1024 * 1024;

/// Fill byte written over a frame when it is handed out.
pub const ALLOC_FILL: u8 = 0x05;

/// Fill byte written over a frame when its last reference is released.
pub const RELEASE_FILL: u8 = 0x01;

const _: () = {
    assert!(FRAME_SIZE.is_power_of_two());
    assert!(1 << FRAME_SHIFT == FRAME_SIZE);
    assert!(PHYS_LOAD.is_multiple_of(FRAME_SIZE));
    assert!(PHYS_TOP.is_multiple_of(FRAME_SIZE));
    assert!(PHYS_TOP > PHYS_LOAD);
    assert!(HHDM_BASE > PHYS_TOP);
    assert!(ALLOC_FILL != RELEASE_FILL);
};
