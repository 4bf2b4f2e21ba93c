//! # Intrusive Rings
//!
//! Circular doubly linked lists threaded through arena members. A [`Ring`]
//! only remembers its cursor; the `next`/`prev` links live in each member's
//! [`Links`]. Appending inserts just before the cursor, so the cursor is the
//! head and its predecessor the tail.

use crate::arena::{Arena, Handle};
use log::error;

/// Position of a member in at most one ring.
pub struct Links<T> {
    next: Option<Handle<T>>,
    prev: Option<Handle<T>>,
}

impl<T> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: None,
            prev: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.next.is_some() || self.prev.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn next(&self) -> Option<Handle<T>> {
        self.next
    }

    #[inline]
    #[must_use]
    pub const fn prev(&self) -> Option<Handle<T>> {
        self.prev
    }
}

impl<T> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Links<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Links<T> {}

impl<T> core::fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Links")
            .field("next", &self.next)
            .field("prev", &self.prev)
            .finish()
    }
}

/// A type that can be threaded onto a [`Ring`].
pub trait RingMember: Sized {
    fn links(&self) -> &Links<Self>;
    fn links_mut(&mut self) -> &mut Links<Self>;
}

/// A circular list of arena members.
pub struct Ring<T> {
    cursor: Option<Handle<T>>,
    len: usize,
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ring")
            .field("cursor", &self.cursor)
            .field("len", &self.len)
            .finish()
    }
}

fn member<T, const N: usize>(arena: &Arena<T, N>, handle: Handle<T>) -> &T {
    arena.get(handle).unwrap_or_else(|| stale(handle))
}

fn member_mut<T, const N: usize>(arena: &mut Arena<T, N>, handle: Handle<T>) -> &mut T {
    arena.get_mut(handle).unwrap_or_else(|| stale(handle))
}

#[cold]
fn stale<T>(handle: Handle<T>) -> ! {
    error!("ring refers to freed member {handle:?}");
    panic!("ring refers to freed member {handle:?}");
}

impl<T> Ring<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cursor: None,
            len: 0,
        }
    }

    /// The head of the ring, `None` when empty.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Option<Handle<T>> {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cursor.is_none()
    }
}

impl<T: RingMember> Ring<T> {
    /// Append `handle` at the tail (just before the cursor).
    ///
    /// The member must not be linked into any ring.
    pub fn push_back<const N: usize>(&mut self, arena: &mut Arena<T, N>, handle: Handle<T>) {
        debug_assert!(!member(arena, handle).links().is_linked());
        match self.cursor {
            None => {
                let links = member_mut(arena, handle).links_mut();
                links.next = Some(handle);
                links.prev = Some(handle);
                self.cursor = Some(handle);
            }
            Some(head) => {
                let tail = member(arena, head).links().prev.unwrap_or(head);
                let links = member_mut(arena, handle).links_mut();
                links.next = Some(head);
                links.prev = Some(tail);
                member_mut(arena, tail).links_mut().next = Some(handle);
                member_mut(arena, head).links_mut().prev = Some(handle);
            }
        }
        self.len += 1;
    }

    /// Unlink `handle`, which must be a member of this ring. If it was the
    /// cursor, the cursor steps back to its predecessor, so the next
    /// [`advance`](Self::advance) lands on the removed member's successor.
    /// Returns `false` if the member was not linked at all.
    pub fn remove<const N: usize>(&mut self, arena: &mut Arena<T, N>, handle: Handle<T>) -> bool {
        let Links { next, prev } = *member(arena, handle).links();
        let (Some(next), Some(prev)) = (next, prev) else {
            return false;
        };

        if self.cursor == Some(handle) {
            self.cursor = (prev != handle).then_some(prev);
        }
        member_mut(arena, prev).links_mut().next = Some(next);
        member_mut(arena, next).links_mut().prev = Some(prev);
        *member_mut(arena, handle).links_mut() = Links::new();
        self.len -= 1;
        true
    }

    /// Move the cursor one step forward and return the new head.
    pub fn advance<const N: usize>(&mut self, arena: &Arena<T, N>) -> Option<Handle<T>> {
        let head = self.cursor?;
        self.cursor = member(arena, head).links().next;
        self.cursor
    }

    /// Members in ring order, starting at the cursor.
    pub fn iter<'a, const N: usize>(&self, arena: &'a Arena<T, N>) -> RingIter<'a, T, N> {
        RingIter {
            arena,
            next: self.cursor,
            remaining: self.len,
        }
    }
}

/// Iterator over the members of a [`Ring`].
pub struct RingIter<'a, T, const N: usize> {
    arena: &'a Arena<T, N>,
    next: Option<Handle<T>>,
    remaining: usize,
}

impl<T: RingMember, const N: usize> Iterator for RingIter<'_, T, N> {
    type Item = Handle<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.next = member(self.arena, current).links().next;
        self.remaining -= 1;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Node {
        links: Links<Node>,
    }

    impl RingMember for Node {
        fn links(&self) -> &Links<Self> {
            &self.links
        }

        fn links_mut(&mut self) -> &mut Links<Self> {
            &mut self.links
        }
    }

    fn ring_of(n: usize) -> (Arena<Node, 8>, Ring<Node>, Vec<Handle<Node>>) {
        let mut arena = Arena::new();
        let mut ring = Ring::new();
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let h = arena.insert(Node::default()).ok().unwrap();
                ring.push_back(&mut arena, h);
                h
            })
            .collect();
        (arena, ring, handles)
    }

    #[test]
    fn append_keeps_insertion_order_from_the_head() {
        let (arena, ring, h) = ring_of(3);
        assert_eq!(ring.iter(&arena).collect::<Vec<_>>(), h);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn advance_cycles_through_every_member() {
        let (arena, mut ring, h) = ring_of(3);
        let visited: Vec<_> = (0..6).filter_map(|_| ring.advance(&arena)).collect();
        assert_eq!(visited, [h[1], h[2], h[0], h[1], h[2], h[0]]);
    }

    #[test]
    fn removing_the_cursor_steps_it_back() {
        let (mut arena, mut ring, h) = ring_of(3);
        assert!(ring.remove(&mut arena, h[0]));
        assert_eq!(ring.cursor(), Some(h[2]));
        assert_eq!(ring.iter(&arena).collect::<Vec<_>>(), [h[2], h[1]]);
        assert!(!arena.get(h[0]).unwrap().links().is_linked());
    }

    #[test]
    fn advance_after_removing_the_cursor_reaches_its_successor() {
        let (mut arena, mut ring, h) = ring_of(3);
        assert_eq!(ring.advance(&arena), Some(h[1]));
        assert!(ring.remove(&mut arena, h[1]));
        assert_eq!(ring.advance(&arena), Some(h[2]));
        assert_eq!(ring.advance(&arena), Some(h[0]));
    }

    #[test]
    fn removing_the_last_member_empties_the_ring() {
        let (mut arena, mut ring, h) = ring_of(1);
        assert!(ring.remove(&mut arena, h[0]));
        assert!(ring.is_empty());
        assert_eq!(ring.advance(&arena), None);
        assert!(!ring.remove(&mut arena, h[0]));
    }

    #[test]
    fn re_added_member_joins_at_the_tail() {
        let (mut arena, mut ring, h) = ring_of(3);
        ring.remove(&mut arena, h[1]);
        ring.push_back(&mut arena, h[1]);
        assert_eq!(ring.iter(&arena).collect::<Vec<_>>(), [h[0], h[2], h[1]]);
    }
}
