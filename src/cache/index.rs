//! Eviction Index Module
//!
//! A sorted doubly-linked list stored in an arena. Elements are ordered
//! ascending by a caller-supplied comparator; every element is addressed by a
//! [`NodeId`] handle that supports O(1) unlink and a localized re-sort after
//! the element's sort key has been mutated in place.
//!
//! Repositioning only inspects the two direct neighbours. When the order is
//! still satisfied nothing moves, otherwise the node walks toward the side
//! that is violated until it fits again. The cost is proportional to the
//! distance moved, which stays small when keys change gradually (expiry
//! refresh, access recency).

use std::cmp::Ordering;
use std::fmt;

/// Comparator used by [`EvictionIndex`] when none is named explicitly.
pub type CompareFn<T> = fn(&T, &T) -> Ordering;

// == Node Handle ==
/// Opaque handle to an element's position in an [`EvictionIndex`].
///
/// Handles are generational: once the element is removed, the handle stops
/// resolving even if the arena slot is reused by a later insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
    generation: u32,
}

// == Eviction Index ==
/// Sorted collection with stable handles, O(1) minimum/maximum and O(1) removal.
pub struct EvictionIndex<T, F = CompareFn<T>> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    compare: F,
}

impl<T, F> EvictionIndex<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    // == Constructor ==
    /// Creates an empty index ordered by `compare`.
    pub fn new(compare: F) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            compare,
        }
    }

    /// Number of elements in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Insert ==
    /// Inserts `value` at its sorted position and returns its handle.
    ///
    /// The search starts at the maximum end, so values that are at least as
    /// large as everything present are linked in O(1). Equal values keep
    /// insertion order.
    pub fn insert(&mut self, value: T) -> NodeId {
        let id = self.allocate(value);

        let mut cursor = self.tail;
        while let Some(c) = cursor {
            if !self.greater(c, id.index) {
                break;
            }
            cursor = self.nodes[c].prev;
        }
        self.link_after(cursor, id.index);
        self.len += 1;
        id
    }

    // == Remove ==
    /// Unlinks the element behind `id` and returns it.
    ///
    /// Returns None when the handle is stale.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.unlink(id.index);
        self.len -= 1;

        let node = &mut self.nodes[id.index];
        node.generation = node.generation.wrapping_add(1);
        let value = node.value.take();
        self.free.push(id.index);
        value
    }

    // == Reposition ==
    /// Restores sort order after the element's key was mutated through
    /// [`get_mut`](Self::get_mut).
    ///
    /// Returns true if the node moved. Stale handles are ignored.
    pub fn reposition(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let idx = id.index;
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        let too_small = prev.is_some_and(|p| self.greater(p, idx));
        let too_large = next.is_some_and(|n| self.greater(idx, n));
        if !too_small && !too_large {
            return false;
        }

        self.unlink(idx);
        if too_small {
            let mut cursor = prev;
            while let Some(c) = cursor {
                if !self.greater(c, idx) {
                    break;
                }
                cursor = self.nodes[c].prev;
            }
            self.link_after(cursor, idx);
        } else {
            let mut cursor = next;
            while let Some(c) = cursor {
                if !self.greater(idx, c) {
                    break;
                }
                cursor = self.nodes[c].next;
            }
            // Linking before `cursor` is linking after its predecessor, or
            // after the current tail when the walk ran off the end.
            let anchor = match cursor {
                Some(c) => self.nodes[c].prev,
                None => self.tail,
            };
            self.link_after(anchor, idx);
        }
        true
    }

    /// Mutates the element in place and repositions it.
    ///
    /// Returns false if the handle is stale.
    pub fn update(&mut self, id: NodeId, f: impl FnOnce(&mut T)) -> bool {
        match self.get_mut(id) {
            Some(value) => {
                f(value);
                self.reposition(id);
                true
            }
            None => false,
        }
    }

    // == Accessors ==
    /// Returns true if `id` still refers to a live element.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index)
            .is_some_and(|n| n.generation == id.generation && n.value.is_some())
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        if !self.contains(id) {
            return None;
        }
        self.nodes[id.index].value.as_ref()
    }

    /// Mutable access to an element. Call [`reposition`](Self::reposition)
    /// afterwards if the sort key changed.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        if !self.contains(id) {
            return None;
        }
        self.nodes[id.index].value.as_mut()
    }

    /// Element with the largest key.
    pub fn maximum(&self) -> Option<&T> {
        self.tail.and_then(|i| self.nodes[i].value.as_ref())
    }

    /// Element with the smallest key.
    pub fn minimum(&self) -> Option<&T> {
        self.head.and_then(|i| self.nodes[i].value.as_ref())
    }

    pub fn maximum_id(&self) -> Option<NodeId> {
        self.tail.map(|i| self.handle(i))
    }

    pub fn minimum_id(&self) -> Option<NodeId> {
        self.head.map(|i| self.handle(i))
    }

    /// Handle of the element directly above `id` in sort order.
    pub fn next_id(&self, id: NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        self.nodes[id.index].next.map(|i| self.handle(i))
    }

    /// Handle of the element directly below `id` in sort order.
    pub fn prev_id(&self, id: NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        self.nodes[id.index].prev.map(|i| self.handle(i))
    }

    /// Iterates elements in ascending order.
    pub fn iter(&self) -> Iter<'_, T, F> {
        Iter {
            index: self,
            cursor: self.head,
        }
    }

    /// Drops every element and invalidates all handles.
    pub fn clear(&mut self) {
        let mut cursor = self.head;
        while let Some(c) = cursor {
            cursor = self.nodes[c].next;
            let node = &mut self.nodes[c];
            node.value = None;
            node.prev = None;
            node.next = None;
            node.generation = node.generation.wrapping_add(1);
            self.free.push(c);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    // == Internals ==
    fn allocate(&mut self, value: T) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let node = &mut self.nodes[index];
                node.value = Some(value);
                node.prev = None;
                node.next = None;
                NodeId {
                    index,
                    generation: node.generation,
                }
            }
            None => {
                self.nodes.push(Node {
                    value: Some(value),
                    prev: None,
                    next: None,
                    generation: 0,
                });
                NodeId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn handle(&self, index: usize) -> NodeId {
        NodeId {
            index,
            generation: self.nodes[index].generation,
        }
    }

    /// True when the value at `a` sorts strictly after the value at `b`.
    fn greater(&self, a: usize, b: usize) -> bool {
        match (&self.nodes[a].value, &self.nodes[b].value) {
            (Some(x), Some(y)) => (self.compare)(x, y) == Ordering::Greater,
            _ => false,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev.take();
        let next = self.nodes[idx].next.take();

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    /// Links `idx` directly after `anchor`, or at the head when `anchor` is None.
    fn link_after(&mut self, anchor: Option<usize>, idx: usize) {
        let next = match anchor {
            Some(a) => self.nodes[a].next,
            None => self.head,
        };

        self.nodes[idx].prev = anchor;
        self.nodes[idx].next = next;

        match anchor {
            Some(a) => self.nodes[a].next = Some(idx),
            None => self.head = Some(idx),
        }
        match next {
            Some(n) => self.nodes[n].prev = Some(idx),
            None => self.tail = Some(idx),
        }
    }
}

impl<T: Ord> Default for EvictionIndex<T> {
    fn default() -> Self {
        Self::new(T::cmp)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for EvictionIndex<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// == Iterator ==
/// Ascending iterator over an [`EvictionIndex`].
pub struct Iter<'a, T, F> {
    index: &'a EvictionIndex<T, F>,
    cursor: Option<usize>,
}

impl<'a, T, F> Iterator for Iter<'a, T, F> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.cursor?;
        let node = &self.index.nodes[c];
        self.cursor = node.next;
        node.value.as_ref()
    }
}
