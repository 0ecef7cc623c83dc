//! Eviction policy implementations (replacers).
//!
//! A replacer tracks the frames that are resident but unpinned and picks the
//! next one to reuse. Implementations:
//! - [`LruReplacer`] - Least Recently Used (the default)
//! - [`FifoReplacer`] - First-In-First-Out
//!
//! The buffer pool picks one at construction through [`ReplacerKind`].

use std::hash::Hash;

mod fifo;
mod lru;

pub use fifo::FifoReplacer;
pub use lru::LruReplacer;

/// An eviction candidate set.
///
/// Every method takes `&self`; implementations guard their state with their
/// own lock so they stay correct when shared outside the buffer pool latch.
pub trait Replacer<T>: Send + Sync {
    /// Mark `value` as an eviction candidate that was just used.
    ///
    /// Inserting a value that is already tracked never creates a duplicate.
    fn insert(&self, value: T);

    /// Remove and return the candidate the policy evicts first, or `None`
    /// when nothing is tracked.
    fn victim(&self) -> Option<T>;

    /// Stop tracking `value`. Returns whether it was tracked.
    fn erase(&self, value: &T) -> bool;

    /// Number of tracked candidates.
    fn size(&self) -> usize;

    /// Whether `value` is currently tracked.
    fn contains(&self, value: &T) -> bool;
}

/// Selects the eviction policy of a buffer pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReplacerKind {
    /// Evict the least recently unpinned frame.
    #[default]
    Lru,
    /// Evict in the order frames first became candidates.
    Fifo,
}

impl ReplacerKind {
    /// Construct an empty replacer of this kind.
    pub fn build<T>(self) -> Box<dyn Replacer<T>>
    where
        T: Clone + Eq + Hash + Send + 'static,
    {
        match self {
            ReplacerKind::Lru => Box::new(LruReplacer::new()),
            ReplacerKind::Fifo => Box::new(FifoReplacer::new()),
        }
    }
}
