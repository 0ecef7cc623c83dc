//! LRU (Least Recently Used) replacement policy.
//!
//! The recency list is a doubly-linked list stored in a `Vec` arena and
//! linked by index, with a `HashMap` from value to node slot. Insert, erase
//! and victim are all O(1); freed slots are recycled.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use super::Replacer;

/// A node of the recency list.
struct Node<T> {
    value: T,
    /// Toward the most recently used end.
    prev: Option<usize>,
    /// Toward the least recently used end.
    next: Option<usize>,
}

struct LruList<T> {
    nodes: Vec<Node<T>>,
    /// Arena slots whose node is no longer linked.
    free_slots: Vec<usize>,
    index: HashMap<T, usize>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
}

impl<T: Clone + Eq + Hash> LruList<T> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_slots: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;

        match self.head {
            Some(h) => self.nodes[h].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn insert(&mut self, value: T) {
        if let Some(&slot) = self.index.get(&value) {
            self.unlink(slot);
            self.push_front(slot);
            return;
        }

        let node = Node {
            value: value.clone(),
            prev: None,
            next: None,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        self.index.insert(value, slot);
        self.push_front(slot);
    }

    fn pop_back(&mut self) -> Option<T> {
        let slot = self.tail?;
        self.unlink(slot);
        self.free_slots.push(slot);

        let value = self.nodes[slot].value.clone();
        self.index.remove(&value);
        Some(value)
    }

    fn erase(&mut self, value: &T) -> bool {
        match self.index.remove(value) {
            Some(slot) => {
                self.unlink(slot);
                self.free_slots.push(slot);
                true
            }
            None => false,
        }
    }

    /// Values from least to most recently used.
    #[cfg(test)]
    fn lru_order(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut cursor = self.tail;
        while let Some(slot) = cursor {
            out.push(self.nodes[slot].value.clone());
            cursor = self.nodes[slot].prev;
        }
        out
    }
}

/// Least-recently-used eviction policy.
///
/// `insert` moves a value to the most recent position; `victim` takes the
/// least recent one.
///
/// # Example
/// ```
/// use pagepool::buffer::replacer::{LruReplacer, Replacer};
///
/// let lru = LruReplacer::new();
/// lru.insert(1);
/// lru.insert(2);
/// lru.insert(1); // 1 is now the most recent
/// assert_eq!(lru.victim(), Some(2));
/// assert_eq!(lru.victim(), Some(1));
/// assert_eq!(lru.victim(), None);
/// ```
pub struct LruReplacer<T> {
    list: Mutex<LruList<T>>,
}

impl<T: Clone + Eq + Hash> LruReplacer<T> {
    /// Create an empty LRU replacer.
    pub fn new() -> Self {
        Self {
            list: Mutex::new(LruList::new()),
        }
    }
}

impl<T: Clone + Eq + Hash> Default for LruReplacer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash + Send> Replacer<T> for LruReplacer<T> {
    fn insert(&self, value: T) {
        self.list.lock().insert(value);
    }

    fn victim(&self) -> Option<T> {
        self.list.lock().pop_back()
    }

    fn erase(&self, value: &T) -> bool {
        self.list.lock().erase(value)
    }

    fn size(&self) -> usize {
        self.list.lock().index.len()
    }

    fn contains(&self, value: &T) -> bool {
        self.list.lock().index.contains_key(value)
    }
}
