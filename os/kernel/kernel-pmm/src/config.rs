//! Runtime knobs of a frame pool.

use crate::error::PoolError;
use kernel_info::memory::{ALLOC_FILL, RELEASE_FILL};

/// Poison patterns written over frames.
///
/// Both fills cover the entire frame. The allocation fill exposes callers that
/// read memory before initializing it; the release fill exposes dangling
/// references to reclaimed frames. They must differ so the two cases can be
/// told apart in a dump.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    alloc_fill: u8,
    release_fill: u8,
}

impl PoolConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            alloc_fill: ALLOC_FILL,
            release_fill: RELEASE_FILL,
        }
    }

    #[must_use]
    pub const fn with_alloc_fill(mut self, fill: u8) -> Self {
        self.alloc_fill = fill;
        self
    }

    #[must_use]
    pub const fn with_release_fill(mut self, fill: u8) -> Self {
        self.release_fill = fill;
        self
    }

    #[inline]
    #[must_use]
    pub const fn alloc_fill(&self) -> u8 {
        self.alloc_fill
    }

    #[inline]
    #[must_use]
    pub const fn release_fill(&self) -> u8 {
        self.release_fill
    }

    /// # Errors
    /// [`PoolError::IdenticalFill`] if both fills are the same byte.
    pub const fn validate(&self) -> Result<(), PoolError> {
        if self.alloc_fill == self.release_fill {
            Err(PoolError::IdenticalFill(self.alloc_fill))
        } else {
            Ok(())
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}
