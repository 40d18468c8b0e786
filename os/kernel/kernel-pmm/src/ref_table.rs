use alloc::boxed::Box;
use alloc::vec;

/// What a single reference drop did to a frame's count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RefDrop {
    /// Other owners remain.
    Shared { remaining: u32 },
    /// The last owner is gone; the frame must be reclaimed.
    Last,
    /// The count was already zero and stays there.
    Clamped,
}

/// One owner count per managed frame, indexed by slot.
///
/// A count of zero means the frame is on the free list; anything above is a
/// live frame with that many owners. Only touched with the pool lock held.
pub(crate) struct RefTable {
    counts: Box<[u32]>,
}

impl RefTable {
    /// All-zero table for `len` slots.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, slot: usize) -> u32 {
        self.counts[slot]
    }

    /// Mark a freshly popped slot as owned by exactly one caller.
    #[inline]
    pub(crate) fn claim(&mut self, slot: usize) {
        debug_assert_eq!(self.counts[slot], 0, "claiming a live slot {slot}");
        self.counts[slot] = 1;
    }

    /// Add an owner to a live slot and return the new count.
    ///
    /// Returns `None` and leaves the count alone if the slot is free or the
    /// count is saturated.
    #[inline]
    pub(crate) fn share(&mut self, slot: usize) -> Option<u32> {
        let count = &mut self.counts[slot];
        if *count == 0 {
            return None;
        }
        *count = count.checked_add(1)?;
        Some(*count)
    }

    /// Drop one owner, clamping at zero.
    #[inline]
    pub(crate) fn drop_ref(&mut self, slot: usize) -> RefDrop {
        let count = &mut self.counts[slot];
        match *count {
            0 => RefDrop::Clamped,
            1 => {
                *count = 0;
                RefDrop::Last
            }
            n => {
                *count = n - 1;
                RefDrop::Shared { remaining: n - 1 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_cycle_back_to_zero() {
        let mut t = RefTable::new(2);
        t.claim(1);
        assert_eq!(t.share(1), Some(2));
        assert_eq!(t.share(1), Some(3));
        assert_eq!(t.get(0), 0);
        assert_eq!(t.drop_ref(1), RefDrop::Shared { remaining: 2 });
        assert_eq!(t.drop_ref(1), RefDrop::Shared { remaining: 1 });
        assert_eq!(t.drop_ref(1), RefDrop::Last);
        assert_eq!(t.get(1), 0);
    }

    #[test]
    fn free_slots_cannot_be_shared_or_underflow() {
        let mut t = RefTable::new(1);
        assert_eq!(t.share(0), None);
        assert_eq!(t.drop_ref(0), RefDrop::Clamped);
        assert_eq!(t.get(0), 0);
    }

    #[test]
    fn saturated_count_is_left_alone() {
        let mut t = RefTable::new(1);
        t.claim(0);
        t.counts[0] = u32::MAX;
        assert_eq!(t.share(0), None);
        assert_eq!(t.get(0), u32::MAX);
    }
}
