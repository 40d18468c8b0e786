//! # Kernel Memory Configuration
//!
//! Compile-time constants shared by the boot code and the physical memory
//! manager: the frame size, the physical window handed to the frame pool,
//! the higher-half direct map offset, and the default poison bytes.
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             ├─────────────────────────────────┤ end of image (runtime)
//!             │    Frame pool                   │
//! PHYS_TOP    └─────────────────────────────────┘
//! ```
//!
//! All values are `const` and checked with compile-time assertions.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
