//! Fixed-capacity circular deque backed by a node arena.
//!
//! The ring is a `Vec` of nodes linked by index. Live values occupy the
//! nodes from `head` forward through `tail`; the remaining nodes form the
//! free region between `tail` and `head` and hold no value. Pushing reuses a
//! free node, popping returns a node to the free region, and a live node can
//! be unlinked or relocated in O(1) through its [`NodeId`].
//!
//! Node ids stay valid for as long as the value they were returned for is
//! live. Once the value is popped or removed the id may be recycled for a
//! later push, so holders that outlive their value should compare the payload
//! before acting on it.

use crate::domain::error::ThrottleError;
use std::fmt;

/// Capacity of a deque created without an explicit size.
pub const DEFAULT_CAPACITY: usize = 16;

/// Handle to a node of a [`BoundedDeque`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

struct Node<T> {
    prev: usize,
    next: usize,
    /// `None` marks a free node, distinct from any stored value
    value: Option<T>,
}

/// Circular doubly-linked deque with O(1) node relinking.
///
/// # Example
/// ```
/// use task_throttle::BoundedDeque;
///
/// let mut deque = BoundedDeque::with_capacity(4);
/// deque.push_back(2).unwrap();
/// deque.push_back(3).unwrap();
/// let first = deque.push_front(1).unwrap();
///
/// deque.move_to_back(first);
/// assert_eq!(deque.iter().copied().collect::<Vec<_>>(), vec![2, 3, 1]);
///
/// assert_eq!(deque.pop_front(), Some(2));
/// assert_eq!(deque.len(), 2);
/// ```
pub struct BoundedDeque<T> {
    nodes: Vec<Node<T>>,
    /// Arena slots excised by a shrink, reused by later growth
    parked: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
    capacity: usize,
    autoresize: bool,
}

impl<T> BoundedDeque<T> {
    /// Create a growable deque with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::build(DEFAULT_CAPACITY, true)
    }

    /// Create a fixed-capacity deque.
    ///
    /// Pushing into a full fixed deque fails with `ThrottleError::QueueFull`.
    /// A capacity of zero yields a growable deque with the default capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::new()
        } else {
            Self::build(capacity, false)
        }
    }

    /// Create a deque that doubles when full and halves when mostly empty.
    pub fn growable(capacity: usize) -> Self {
        Self::build(capacity.max(1), true)
    }

    fn build(capacity: usize, autoresize: bool) -> Self {
        let nodes = (0..capacity)
            .map(|i| Node {
                prev: (i + capacity - 1) % capacity,
                next: (i + 1) % capacity,
                value: None,
            })
            .collect();
        Self {
            nodes,
            parked: Vec::new(),
            head: 0,
            tail: capacity - 1,
            len: 0,
            capacity,
            autoresize,
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the deque holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if every node holds a value.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Current number of nodes in the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the deque resizes itself.
    pub fn is_growable(&self) -> bool {
        self.autoresize
    }

    /// Append a value, returning the node that now holds it.
    ///
    /// # Errors
    /// Returns `ThrottleError::QueueFull` if the deque is full and fixed.
    pub fn push_back(&mut self, value: T) -> Result<NodeId, ThrottleError> {
        self.ensure_room()?;
        self.tail = self.next_of(self.tail);
        self.nodes[self.tail].value = Some(value);
        self.len += 1;
        Ok(NodeId(self.tail))
    }

    /// Prepend a value, returning the node that now holds it.
    ///
    /// # Errors
    /// Returns `ThrottleError::QueueFull` if the deque is full and fixed.
    pub fn push_front(&mut self, value: T) -> Result<NodeId, ThrottleError> {
        self.ensure_room()?;
        self.head = self.prev_of(self.head);
        self.nodes[self.head].value = Some(value);
        self.len += 1;
        Ok(NodeId(self.head))
    }

    /// Remove and return the last value.
    pub fn pop_back(&mut self) -> Option<T> {
        let value = self.take_back()?;
        self.maybe_shrink();
        Some(value)
    }

    /// Remove and return the first value.
    pub fn pop_front(&mut self) -> Option<T> {
        let value = self.take_front()?;
        self.maybe_shrink();
        Some(value)
    }

    /// First value, if any.
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.nodes[self.head].value.as_ref()
    }

    /// Last value, if any.
    pub fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.nodes[self.tail].value.as_ref()
    }

    /// Value held by a live node.
    pub fn get(&self, node: NodeId) -> Option<&T> {
        self.nodes.get(node.0).and_then(|n| n.value.as_ref())
    }

    /// Mutable access to the value held by a live node.
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(node.0).and_then(|n| n.value.as_mut())
    }

    /// Unlink a live node and return its value.
    ///
    /// The node is relinked into the free region. Returns `None` if the node
    /// holds no value.
    pub fn remove(&mut self, node: NodeId) -> Option<T> {
        let index = node.0;
        if !self.is_live(index) {
            return None;
        }
        if index == self.tail {
            return self.pop_back();
        }
        if index == self.head {
            return self.pop_front();
        }
        let value = self.nodes[index].value.take();
        self.unlink(index);
        self.link_after(self.tail, index);
        self.len -= 1;
        self.maybe_shrink();
        value
    }

    /// Relocate a live node to the back. Returns `false` if the node is not live.
    pub fn move_to_back(&mut self, node: NodeId) -> bool {
        let index = node.0;
        if !self.is_live(index) {
            return false;
        }
        if index == self.tail {
            return true;
        }
        if index == self.head {
            self.head = self.next_of(index);
        }
        self.unlink(index);
        self.link_after(self.tail, index);
        self.tail = index;
        true
    }

    /// Relocate a live node to the front. Returns `false` if the node is not live.
    pub fn move_to_front(&mut self, node: NodeId) -> bool {
        let index = node.0;
        if !self.is_live(index) {
            return false;
        }
        if index == self.head {
            return true;
        }
        if index == self.tail {
            self.tail = self.prev_of(index);
        }
        self.unlink(index);
        let before = self.prev_of(self.head);
        self.link_after(before, index);
        self.head = index;
        true
    }

    /// Change the number of nodes in the ring.
    ///
    /// Growing splices fresh nodes into the free region. Shrinking excises
    /// free nodes; if `new_capacity` is below the current length, the oldest
    /// `len - new_capacity` values are removed first and returned. A capacity
    /// of zero is treated as one.
    pub fn resize(&mut self, new_capacity: usize) -> Vec<T> {
        let new_capacity = new_capacity.max(1);
        let mut evicted = Vec::new();
        if new_capacity > self.capacity {
            self.grow(new_capacity - self.capacity);
        } else if new_capacity < self.capacity {
            while self.len > new_capacity {
                if let Some(value) = self.take_front() {
                    evicted.push(value);
                }
            }
            self.excise_free(self.capacity - new_capacity);
        }
        self.capacity = new_capacity;
        evicted
    }

    /// Drop every value. Growable deques return to the default capacity.
    pub fn clear(&mut self) {
        while self.take_front().is_some() {}
        if self.autoresize {
            self.resize(DEFAULT_CAPACITY);
        }
    }

    /// Iterate over live values from front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            deque: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Cursor that can remove the value it just yielded.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, T> {
        let upcoming = (!self.is_empty()).then_some(self.head);
        CursorMut {
            deque: self,
            current: None,
            upcoming,
        }
    }

    fn is_live(&self, index: usize) -> bool {
        self.nodes
            .get(index)
            .map_or(false, |node| node.value.is_some())
    }

    fn next_of(&self, index: usize) -> usize {
        self.nodes[index].next
    }

    fn prev_of(&self, index: usize) -> usize {
        self.nodes[index].prev
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_after(&mut self, anchor: usize, index: usize) {
        let next = self.nodes[anchor].next;
        self.nodes[index].prev = anchor;
        self.nodes[index].next = next;
        self.nodes[anchor].next = index;
        self.nodes[next].prev = index;
    }

    fn take_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.nodes[self.tail].value.take();
        self.tail = self.prev_of(self.tail);
        self.len -= 1;
        value
    }

    fn take_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.nodes[self.head].value.take();
        self.head = self.next_of(self.head);
        self.len -= 1;
        value
    }

    fn ensure_room(&mut self) -> Result<(), ThrottleError> {
        if !self.is_full() {
            return Ok(());
        }
        if !self.autoresize {
            return Err(ThrottleError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.resize(self.capacity * 2);
        Ok(())
    }

    fn maybe_shrink(&mut self) {
        if !self.autoresize || self.capacity <= DEFAULT_CAPACITY {
            return;
        }
        if self.len < self.capacity / 4 {
            self.resize((self.capacity / 2).max(DEFAULT_CAPACITY));
        }
    }

    fn grow(&mut self, extra: usize) {
        for _ in 0..extra {
            let index = match self.parked.pop() {
                Some(index) => index,
                None => {
                    self.nodes.push(Node {
                        prev: 0,
                        next: 0,
                        value: None,
                    });
                    self.nodes.len() - 1
                }
            };
            let before = self.prev_of(self.head);
            self.link_after(before, index);
        }
        if self.is_empty() {
            self.tail = self.prev_of(self.head);
        }
    }

    /// Excise `count` nodes from the free region, starting right after `tail`.
    fn excise_free(&mut self, count: usize) {
        for _ in 0..count {
            let spare = self.next_of(self.tail);
            // Only an empty ring has `head` inside its free region.
            if spare == self.head {
                self.head = self.next_of(spare);
            }
            self.unlink(spare);
            self.parked.push(spare);
        }
    }
}

impl<T> Default for BoundedDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedDeque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedDeque")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("autoresize", &self.autoresize)
            .field("values", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> FromIterator<T> for BoundedDeque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut deque = Self::new();
        for value in iter {
            // A growable deque never reports QueueFull.
            let _ = deque.push_back(value);
        }
        deque
    }
}

/// Iterator over the live values of a [`BoundedDeque`].
pub struct Iter<'a, T> {
    deque: &'a BoundedDeque<T>,
    cursor: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let deque = self.deque;
        let node = &deque.nodes[self.cursor];
        self.cursor = node.next;
        self.remaining -= 1;
        node.value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a BoundedDeque<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Restartable forward cursor over a [`BoundedDeque`].
///
/// Removing the value just yielded leaves the traversal positioned on its
/// successor, so no neighbour is skipped or visited twice.
///
/// # Example
/// ```
/// use task_throttle::BoundedDeque;
///
/// let mut deque: BoundedDeque<u32> = (1..=5).collect();
/// let mut cursor = deque.cursor_mut();
/// while let Some(value) = cursor.move_next() {
///     if *value % 2 == 0 {
///         cursor.remove_current();
///     }
/// }
/// assert_eq!(deque.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5]);
/// ```
pub struct CursorMut<'a, T> {
    deque: &'a mut BoundedDeque<T>,
    current: Option<usize>,
    upcoming: Option<usize>,
}

impl<T> CursorMut<'_, T> {
    /// Advance and yield the next live value.
    pub fn move_next(&mut self) -> Option<&mut T> {
        let index = self.upcoming?;
        self.current = Some(index);
        self.upcoming = (index != self.deque.tail).then(|| self.deque.next_of(index));
        self.deque.nodes[index].value.as_mut()
    }

    /// Remove the value most recently yielded by `move_next`.
    ///
    /// Returns `None` if nothing was yielded since the last removal or reset.
    pub fn remove_current(&mut self) -> Option<T> {
        let index = self.current.take()?;
        self.deque.remove(NodeId(index))
    }

    /// Node of the value most recently yielded.
    pub fn current_node(&self) -> Option<NodeId> {
        self.current.map(NodeId)
    }

    /// Restart the traversal from the front.
    pub fn reset(&mut self) {
        self.current = None;
        self.upcoming = (!self.deque.is_empty()).then_some(self.deque.head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<T: Clone>(deque: &BoundedDeque<T>) -> Vec<T> {
        deque.iter().cloned().collect()
    }

    /// Walk the ring twice in both directions to check the links.
    fn assert_ring<T>(deque: &BoundedDeque<T>) {
        let mut cursor = deque.head;
        for _ in 0..deque.capacity {
            let next = deque.nodes[cursor].next;
            assert_eq!(deque.nodes[next].prev, cursor);
            cursor = next;
        }
        assert_eq!(cursor, deque.head, "ring must close after capacity steps");
        // Live values run head..=tail, free nodes fill the rest of the ring.
        let mut cursor = deque.head;
        for _ in 0..deque.len {
            assert!(deque.nodes[cursor].value.is_some());
            cursor = deque.next_of(cursor);
        }
        for _ in deque.len..deque.capacity {
            assert!(deque.nodes[cursor].value.is_none());
            cursor = deque.next_of(cursor);
        }
        if deque.len == 0 {
            assert_eq!(deque.prev_of(deque.head), deque.tail);
        } else {
            let mut last = deque.head;
            for _ in 1..deque.len {
                last = deque.next_of(last);
            }
            assert_eq!(last, deque.tail);
        }
    }

    #[test]
    fn test_fixed_ring_closes() {
        let deque: BoundedDeque<u8> = BoundedDeque::with_capacity(10);
        assert_eq!(deque.capacity(), 10);
        assert!(!deque.is_growable());
        assert_eq!(deque.prev_of(deque.head), deque.tail);
        assert_ring(&deque);
    }

    #[test]
    fn test_push_returns_node() {
        let mut deque = BoundedDeque::with_capacity(10);
        let first = deque.push_back(1).unwrap();
        assert_eq!(first, NodeId(deque.head));
        let second = deque.push_back(2).unwrap();
        assert_eq!(second, NodeId(deque.tail));
        assert_eq!(deque.get(second), Some(&2));
    }

    #[test]
    fn test_push_into_full_fixed_deque() {
        let mut deque = BoundedDeque::with_capacity(3);
        for i in 0..3 {
            deque.push_back(i).unwrap();
        }
        assert!(deque.is_full());
        assert_eq!(
            deque.push_back(3),
            Err(ThrottleError::QueueFull { capacity: 3 })
        );
        assert_eq!(
            deque.push_front(3),
            Err(ThrottleError::QueueFull { capacity: 3 })
        );
        assert_eq!(values(&deque), vec![0, 1, 2]);
    }

    #[test]
    fn test_pop_on_empty() {
        let mut deque: BoundedDeque<u8> = BoundedDeque::with_capacity(4);
        assert_eq!(deque.pop_back(), None);
        assert_eq!(deque.pop_front(), None);
        assert_eq!(deque.front(), None);
        assert_eq!(deque.back(), None);
    }

    #[test]
    fn test_stores_unit_and_none_values() {
        let mut deque = BoundedDeque::with_capacity(2);
        deque.push_back(None::<u8>).unwrap();
        assert_eq!(deque.len(), 1);
        assert_eq!(deque.pop_front(), Some(None));
    }

    #[test]
    fn test_shift_and_unshift() {
        let mut deque = BoundedDeque::with_capacity(5);
        for i in 1..=4 {
            deque.push_back(i).unwrap();
        }
        assert_eq!(deque.pop_front(), Some(1));
        assert_eq!(deque.len(), 3);
        deque.push_front(0).unwrap();
        assert_eq!(values(&deque), vec![0, 2, 3, 4]);
        assert_eq!(deque.front(), Some(&0));
        assert_eq!(deque.back(), Some(&4));
        assert_ring(&deque);
    }

    #[test]
    fn test_push_front_into_empty() {
        let mut deque = BoundedDeque::with_capacity(5);
        deque.push_front(0).unwrap();
        assert_eq!(deque.len(), 1);
        assert_eq!(deque.head, deque.tail);
        assert_eq!(deque.pop_back(), Some(0));
        assert_eq!(deque.prev_of(deque.head), deque.tail);
    }

    #[test]
    fn test_wraps_around_ring() {
        let mut deque = BoundedDeque::with_capacity(3);
        for round in 0..10 {
            deque.push_back(round).unwrap();
            deque.push_back(round + 100).unwrap();
            assert_eq!(deque.pop_front(), Some(round));
            assert_eq!(deque.pop_front(), Some(round + 100));
        }
        assert!(deque.is_empty());
        assert_ring(&deque);
    }

    #[test]
    fn test_remove_middle_node() {
        let mut deque = BoundedDeque::with_capacity(5);
        let ids: Vec<_> = (0..4).map(|i| deque.push_back(i).unwrap()).collect();
        assert_eq!(deque.remove(ids[1]), Some(1));
        assert_eq!(values(&deque), vec![0, 2, 3]);
        assert_eq!(deque.get(ids[1]), None);
        assert_eq!(deque.remove(ids[1]), None);
        assert_ring(&deque);

        // The freed node is reused by the next push.
        deque.push_back(9).unwrap();
        deque.push_back(10).unwrap();
        assert_eq!(values(&deque), vec![0, 2, 3, 9, 10]);
        assert!(deque.is_full());
        assert_ring(&deque);
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut deque = BoundedDeque::with_capacity(4);
        let ids: Vec<_> = (0..3).map(|i| deque.push_back(i).unwrap()).collect();
        assert_eq!(deque.remove(ids[0]), Some(0));
        assert_eq!(deque.remove(ids[2]), Some(2));
        assert_eq!(values(&deque), vec![1]);
        assert_eq!(deque.remove(ids[1]), Some(1));
        assert!(deque.is_empty());
        assert_ring(&deque);
    }

    #[test]
    fn test_move_to_back_and_front() {
        let mut deque = BoundedDeque::with_capacity(4);
        let ids: Vec<_> = (0..4).map(|i| deque.push_back(i).unwrap()).collect();

        assert!(deque.move_to_back(ids[0]));
        assert_eq!(values(&deque), vec![1, 2, 3, 0]);
        assert!(deque.move_to_back(ids[2]));
        assert_eq!(values(&deque), vec![1, 3, 0, 2]);
        assert!(deque.move_to_front(ids[2]));
        assert_eq!(values(&deque), vec![2, 1, 3, 0]);
        assert!(deque.move_to_front(ids[3]));
        assert_eq!(values(&deque), vec![3, 2, 1, 0]);
        assert_ring(&deque);

        deque.pop_back();
        assert!(!deque.move_to_back(ids[0]));
        assert!(!deque.move_to_front(ids[0]));
    }

    #[test]
    fn test_move_within_partially_filled_ring() {
        let mut deque = BoundedDeque::with_capacity(8);
        let ids: Vec<_> = (0..3).map(|i| deque.push_back(i).unwrap()).collect();
        assert!(deque.move_to_front(ids[2]));
        assert!(deque.move_to_back(ids[2]));
        assert_eq!(values(&deque), vec![0, 1, 2]);
        deque.push_back(3).unwrap();
        deque.push_front(-1).unwrap();
        assert_eq!(values(&deque), vec![-1, 0, 1, 2, 3]);
        assert_ring(&deque);
    }

    #[test]
    fn test_autoresize_doubles() {
        let mut deque = BoundedDeque::new();
        for i in 0..DEFAULT_CAPACITY {
            deque.push_back(i).unwrap();
        }
        deque.push_back(DEFAULT_CAPACITY).unwrap();
        assert_eq!(deque.capacity(), DEFAULT_CAPACITY * 2);
        assert_eq!(values(&deque), (0..=DEFAULT_CAPACITY).collect::<Vec<_>>());
        assert_ring(&deque);
    }

    #[test]
    fn test_autoresize_push_front_keeps_order() {
        let mut deque = BoundedDeque::growable(2);
        deque.push_back(1).unwrap();
        deque.push_back(2).unwrap();
        deque.push_front(0).unwrap();
        assert_eq!(deque.capacity(), 4);
        assert_eq!(values(&deque), vec![0, 1, 2]);
        assert_ring(&deque);
    }

    #[test]
    fn test_autoresize_shrinks_below_quarter() {
        let mut deque = BoundedDeque::new();
        for i in 0..64 {
            deque.push_back(i).unwrap();
        }
        assert_eq!(deque.capacity(), 64);
        while deque.len() >= 16 {
            deque.pop_front();
        }
        assert_eq!(deque.len(), 15);
        assert_eq!(deque.capacity(), 32);
        while deque.pop_front().is_some() {}
        assert_eq!(deque.capacity(), DEFAULT_CAPACITY);
        assert_ring(&deque);
    }

    #[test]
    fn test_resize_grow_and_shrink_free_nodes() {
        let mut deque = BoundedDeque::with_capacity(4);
        deque.push_back(1).unwrap();
        deque.push_back(2).unwrap();
        assert!(deque.resize(8).is_empty());
        assert_eq!(deque.capacity(), 8);
        assert_ring(&deque);
        assert!(deque.resize(3).is_empty());
        assert_eq!(deque.capacity(), 3);
        assert_eq!(values(&deque), vec![1, 2]);
        assert_ring(&deque);
        deque.push_back(3).unwrap();
        assert!(deque.push_back(4).is_err());
    }

    #[test]
    fn test_resize_below_length_drops_oldest() {
        let mut deque = BoundedDeque::with_capacity(5);
        for i in 0..5 {
            deque.push_back(i).unwrap();
        }
        assert_eq!(deque.resize(2), vec![0, 1, 2]);
        assert_eq!(values(&deque), vec![3, 4]);
        assert_eq!(deque.capacity(), 2);
        assert_ring(&deque);
    }

    #[test]
    fn test_resize_empty_ring() {
        let mut deque: BoundedDeque<u8> = BoundedDeque::with_capacity(6);
        deque.resize(2);
        assert_ring(&deque);
        deque.resize(5);
        assert_ring(&deque);
        deque.push_back(1).unwrap();
        assert_eq!(deque.front(), Some(&1));
    }

    #[test]
    fn test_parked_nodes_are_reused() {
        let mut deque: BoundedDeque<u8> = BoundedDeque::with_capacity(8);
        deque.resize(2);
        deque.resize(8);
        assert_eq!(deque.nodes.len(), 8);
        assert_ring(&deque);
    }

    #[test]
    fn test_clear() {
        let mut deque = BoundedDeque::new();
        for i in 0..40 {
            deque.push_back(i).unwrap();
        }
        deque.clear();
        assert!(deque.is_empty());
        assert_eq!(deque.capacity(), DEFAULT_CAPACITY);
        assert_ring(&deque);

        let mut fixed = BoundedDeque::with_capacity(5);
        fixed.push_back(1).unwrap();
        fixed.clear();
        assert!(fixed.is_empty());
        assert_eq!(fixed.capacity(), 5);
    }

    #[test]
    fn test_cursor_removes_without_skipping() {
        let mut deque: BoundedDeque<u32> = (0..6).collect();
        let mut seen = Vec::new();
        let mut cursor = deque.cursor_mut();
        while let Some(value) = cursor.move_next() {
            seen.push(*value);
            if *value == 2 || *value == 3 || *value == 5 {
                assert!(cursor.remove_current().is_some());
                assert!(cursor.remove_current().is_none());
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(values(&deque), vec![0, 1, 4]);
    }

    #[test]
    fn test_cursor_reset_restarts() {
        let mut deque: BoundedDeque<u32> = (1..=3).collect();
        let mut cursor = deque.cursor_mut();
        assert_eq!(cursor.move_next().copied(), Some(1));
        cursor.remove_current();
        cursor.reset();
        assert_eq!(cursor.move_next().copied(), Some(2));
        if let Some(value) = cursor.move_next() {
            *value *= 10;
        }
        assert_eq!(cursor.move_next(), None);
        assert_eq!(values(&deque), vec![2, 30]);
    }

    #[test]
    fn test_iter_is_exact_size() {
        let deque: BoundedDeque<u8> = (0..7).collect();
        assert_eq!(deque.iter().len(), 7);
        assert_eq!((&deque).into_iter().sum::<u8>(), 21);
    }
}
