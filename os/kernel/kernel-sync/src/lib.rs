//! # Kernel synchronization primitives
//!
//! Busy-waiting primitives for code that may run on any core and must never
//! sleep: a [`SpinLock`] for short critical sections and a [`SyncOnceCell`]
//! for singletons built once during boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
