//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;

use super::Replacer;

struct FifoQueue<T> {
    /// Values in insertion order (front = oldest), tagged with the sequence
    /// number they were inserted under.
    queue: VecDeque<(T, u64)>,

    /// Live values and their current sequence number.
    live: HashMap<T, u64>,

    next_seq: u64,
}

/// A FIFO eviction policy.
///
/// Re-inserting a tracked value does not move it: candidates are evicted in
/// the order they first became candidates.
///
/// `erase` is O(1): it only drops the value from the live map, and `victim`
/// skips queue entries whose sequence number is stale.
pub struct FifoReplacer<T> {
    inner: Mutex<FifoQueue<T>>,
}

impl<T: Clone + Eq + Hash> FifoReplacer<T> {
    /// Create a new FIFO replacer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FifoQueue {
                queue: VecDeque::new(),
                live: HashMap::new(),
                next_seq: 0,
            }),
        }
    }
}

impl<T: Clone + Eq + Hash> Default for FifoReplacer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash + Send> Replacer<T> for FifoReplacer<T> {
    fn insert(&self, value: T) {
        let mut inner = self.inner.lock();
        if inner.live.contains_key(&value) {
            return;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push_back((value.clone(), seq));
        inner.live.insert(value, seq);

        // Pin/unpin churn leaves stale entries behind; drop them once they
        // dominate the queue.
        if inner.queue.len() > 2 * inner.live.len() + 64 {
            let FifoQueue { queue, live, .. } = &mut *inner;
            queue.retain(|(v, s)| live.get(v) == Some(s));
        }
    }

    fn victim(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while let Some((value, seq)) = inner.queue.pop_front() {
            if inner.live.get(&value) == Some(&seq) {
                inner.live.remove(&value);
                return Some(value);
            }
            // Erased (or erased and re-inserted later), skip it
        }
        None
    }

    fn erase(&self, value: &T) -> bool {
        self.inner.lock().live.remove(value).is_some()
    }

    fn size(&self) -> usize {
        self.inner.lock().live.len()
    }

    fn contains(&self, value: &T) -> bool {
        self.inner.lock().live.contains_key(value)
    }
}
