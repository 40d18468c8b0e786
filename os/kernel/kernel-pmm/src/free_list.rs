use alloc::boxed::Box;
use alloc::vec;

/// Link value terminating the list.
const NIL: usize = usize::MAX;

/// LIFO stack of free frame slots.
///
/// The links live in a side table (`next[slot]`) instead of inside the free
/// frames themselves, so frame contents are never reinterpreted as pointers
/// and poisoning a frame cannot corrupt the list.
///
/// ```text
///  head ─► slot 7 ─► slot 3 ─► slot 0 ─► NIL
/// ```
///
/// # Invariants
/// - Every slot is on the list at most once.
/// - `len` equals the number of slots reachable from `head`.
/// - `next[slot]` is only meaningful while `slot` is on the list.
pub(crate) struct FreeList {
    head: usize,
    next: Box<[usize]>,
    len: usize,
}

impl FreeList {
    /// Empty list able to hold slots `0..capacity`.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            head: NIL,
            next: vec![NIL; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.head == NIL
    }

    /// Push `slot` as the new head.
    ///
    /// The caller guarantees `slot` is not already listed.
    #[inline]
    pub(crate) fn push(&mut self, slot: usize) {
        debug_assert!(slot < self.next.len(), "slot {slot} out of bounds");
        self.next[slot] = self.head;
        self.head = slot;
        self.len += 1;
    }

    /// Pop the most recently pushed slot.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let slot = self.head;
        self.head = self.next[slot];
        self.next[slot] = NIL;
        self.len -= 1;
        Some(slot)
    }

    /// Slot that the next [`pop`](Self::pop) would return.
    #[inline]
    pub(crate) const fn peek(&self) -> Option<usize> {
        if self.is_empty() { None } else { Some(self.head) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_reverse_push_order() {
        let mut l = FreeList::with_capacity(4);
        assert!(l.is_empty());
        for slot in [0, 2, 3] {
            l.push(slot);
        }
        assert_eq!(l.len(), 3);
        assert_eq!(l.peek(), Some(3));
        assert_eq!(l.pop(), Some(3));
        assert_eq!(l.pop(), Some(2));
        l.push(1);
        assert_eq!(l.pop(), Some(1));
        assert_eq!(l.pop(), Some(0));
        assert_eq!(l.pop(), None);
        assert!(l.is_empty());
        assert_eq!(l.len(), 0);
    }

    #[test]
    fn zero_capacity_is_always_empty() {
        let mut l = FreeList::with_capacity(0);
        assert_eq!(l.pop(), None);
        assert_eq!(l.peek(), None);
    }
}
