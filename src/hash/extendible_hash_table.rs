//! Extendible hash table.
//!
//! ```text
//!  directory (global_depth = 2)          buckets (arena)
//!  ┌──────┐
//!  │ 0b00 │──────────────┐               ┌───────────────────────┐
//!  ├──────┤              ├──────────────▶│ #0  local_depth = 1   │
//!  │ 0b01 │─────────┐    │               └───────────────────────┘
//!  ├──────┤         │    │               ┌───────────────────────┐
//!  │ 0b10 │─────────┼────┘          ┌───▶│ #1  local_depth = 2   │
//!  ├──────┤         │               │    └───────────────────────┘
//!  │ 0b11 │────┐    └───────────────┘    ┌───────────────────────┐
//!  └──────┘    └────────────────────────▶│ #2  local_depth = 2   │
//!                                        └───────────────────────┘
//! ```
//!
//! A key lives in the bucket addressed by the low `global_depth` bits of its
//! hash. A bucket of local depth `d` is shared by the `2^(global_depth - d)`
//! slots that agree on the low `d` bits. Directory slots hold arena indices,
//! so a split is an index rewrite.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use log::{debug, trace};
use parking_lot::Mutex;

/// Bits available for addressing.
const HASH_BITS: u32 = u64::BITS;

struct Bucket<K, V> {
    local_depth: u32,
    records: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.records.iter().position(|(k, _)| k == key)
    }
}

struct Directory<K, V> {
    global_depth: u32,
    /// `2^global_depth` arena indices.
    slots: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
    len: usize,
}

impl<K, V> Directory<K, V> {
    #[inline]
    fn slot_of(&self, hash: u64) -> usize {
        (hash & low_mask(self.global_depth)) as usize
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        self.slots[self.slot_of(hash)]
    }

    /// Double the directory; the new upper half mirrors the lower half.
    fn grow(&mut self) {
        let n = self.slots.len();
        self.slots.extend_from_within(..n);
        self.global_depth += 1;
        debug!(
            "page table directory doubled to {} slots (global depth {})",
            self.slots.len(),
            self.global_depth
        );
    }
}

#[inline]
fn low_mask(depth: u32) -> u64 {
    if depth >= HASH_BITS {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

/// A concurrent hash map built on extendible hashing.
///
/// Buckets hold at most `bucket_size` records. Inserting into a full bucket
/// splits it, doubling the directory first when the bucket is already
/// addressed by every directory bit. Removal never merges buckets or shrinks
/// the directory.
///
/// One mutex serializes every operation, so the table may be shared freely
/// between threads.
///
/// If every record of a full bucket has exactly the same hash as the key being
/// inserted, no split can separate them, and the bucket is allowed to grow
/// past `bucket_size`.
///
/// # Example
/// ```
/// use pagepool::hash::{BuildIdentityHasher, ExtendibleHashTable};
///
/// let table = ExtendibleHashTable::with_hasher(1, BuildIdentityHasher::default());
/// table.insert(0u32, "zero");
/// table.insert(1u32, "one"); // same slot at depth 0: split + doubling
///
/// assert_eq!(table.global_depth(), 1);
/// assert_eq!(table.find(&0), Some("zero"));
/// assert_eq!(table.find(&1), Some("one"));
/// ```
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    dir: Mutex<Directory<K, V>>,
    hash_builder: S,
    bucket_size: usize,
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V, RandomState> {
    /// Create a table with the standard library's randomized hasher.
    ///
    /// # Panics
    /// Panics if `bucket_size` is 0.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    /// Create a table with one empty bucket at depth 0.
    ///
    /// # Panics
    /// Panics if `bucket_size` is 0.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket_size must be > 0");

        Self {
            dir: Mutex::new(Directory {
                global_depth: 0,
                slots: vec![0],
                buckets: vec![Bucket {
                    local_depth: 0,
                    records: Vec::new(),
                }],
                len: 0,
            }),
            hash_builder,
            bucket_size,
        }
    }

    #[inline]
    fn hash_of(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Look up the value stored for `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash_of(key);
        let dir = self.dir.lock();
        let bucket = &dir.buckets[dir.bucket_of(hash)];

        bucket.position(key).map(|i| bucket.records[i].1.clone())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let dir = self.dir.lock();
        dir.buckets[dir.bucket_of(hash)].position(key).is_some()
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let mut dir = self.dir.lock();
        let idx = dir.bucket_of(hash);

        match dir.buckets[idx].position(key) {
            Some(i) => {
                dir.buckets[idx].records.swap_remove(i);
                dir.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Insert or overwrite the value for `key`.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut dir = self.dir.lock();
        let mut idx = dir.bucket_of(hash);

        if let Some(i) = dir.buckets[idx].position(&key) {
            dir.buckets[idx].records[i].1 = value;
            return;
        }

        while dir.buckets[idx].records.len() >= self.bucket_size {
            if !self.can_separate(&dir.buckets[idx], hash) {
                trace!("page table bucket {} overflows on identical hashes", idx);
                break;
            }
            if dir.buckets[idx].local_depth == dir.global_depth {
                dir.grow();
            }
            self.split(&mut dir, idx);
            idx = dir.bucket_of(hash);
        }

        dir.buckets[idx].records.push((key, value));
        dir.len += 1;
    }

    /// A split can only relieve `bucket` if some record's hash differs from
    /// the incoming one in a bit the bucket does not already consume.
    fn can_separate(&self, bucket: &Bucket<K, V>, hash: u64) -> bool {
        bucket.local_depth < HASH_BITS
            && bucket.records.iter().any(|(k, _)| self.hash_of(k) != hash)
    }

    /// Split the bucket at arena index `idx` on bit `local_depth`.
    ///
    /// The low half stays at `idx`, the high half is appended to the arena,
    /// and every directory slot with that bit set is repointed.
    fn split(&self, dir: &mut Directory<K, V>, idx: usize) {
        let depth = dir.buckets[idx].local_depth;
        debug_assert!(depth < dir.global_depth);

        let split_bit = 1u64 << depth;
        let records = std::mem::take(&mut dir.buckets[idx].records);
        let (high, low): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|(k, _)| self.hash_of(k) & split_bit != 0);

        debug!(
            "splitting page table bucket {} at depth {} ({} low, {} high)",
            idx,
            depth,
            low.len(),
            high.len()
        );

        dir.buckets[idx] = Bucket {
            local_depth: depth + 1,
            records: low,
        };
        let sibling = dir.buckets.len();
        dir.buckets.push(Bucket {
            local_depth: depth + 1,
            records: high,
        });

        for (slot, target) in dir.slots.iter_mut().enumerate() {
            if *target == idx && (slot as u64) & split_bit != 0 {
                *target = sibling;
            }
        }
    }

    /// Number of hash bits addressing the directory.
    pub fn global_depth(&self) -> u32 {
        self.dir.lock().global_depth
    }

    /// Local depth of the bucket referenced by directory slot `slot`, or
    /// `None` if the slot is out of range.
    pub fn local_depth(&self, slot: usize) -> Option<u32> {
        let dir = self.dir.lock();
        dir.slots.get(slot).map(|&idx| dir.buckets[idx].local_depth)
    }

    /// Number of distinct buckets.
    pub fn bucket_count(&self) -> usize {
        self.dir.lock().buckets.len()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.dir.lock().len
    }

    /// True if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every structural invariant, panicking on the first violation.
    ///
    /// - the directory has `2^global_depth` slots
    /// - every bucket has `local_depth <= global_depth` and is referenced by
    ///   exactly the `2^(global_depth - local_depth)` slots sharing its low
    ///   `local_depth` bits
    /// - every record is addressed by the bucket holding it
    /// - no bucket exceeds `bucket_size` unless all its hashes are identical
    pub fn verify_integrity(&self) {
        let dir = self.dir.lock();
        let gd = dir.global_depth;

        assert_eq!(dir.slots.len(), 1usize << gd, "directory size");

        let mut refs = vec![0usize; dir.buckets.len()];
        let mut address = vec![None; dir.buckets.len()];
        for (slot, &idx) in dir.slots.iter().enumerate() {
            let bucket = &dir.buckets[idx];
            assert!(bucket.local_depth <= gd, "local depth exceeds global depth");

            let bits = slot as u64 & low_mask(bucket.local_depth);
            match address[idx] {
                None => address[idx] = Some(bits),
                Some(expected) => assert_eq!(expected, bits, "bucket {} aliased by mismatched slots", idx),
            }
            refs[idx] += 1;
        }

        let mut total = 0;
        for (idx, bucket) in dir.buckets.iter().enumerate() {
            assert_eq!(
                refs[idx],
                1usize << (gd - bucket.local_depth),
                "bucket {} reference count",
                idx
            );

            let bits = address[idx].unwrap_or_default();
            for (k, _) in &bucket.records {
                assert_eq!(
                    self.hash_of(k) & low_mask(bucket.local_depth),
                    bits,
                    "record misplaced in bucket {}",
                    idx
                );
            }

            if bucket.records.len() > self.bucket_size {
                let first = self.hash_of(&bucket.records[0].0);
                assert!(
                    bucket.records.iter().all(|(k, _)| self.hash_of(k) == first),
                    "bucket {} overflowed",
                    idx
                );
            }
            total += bucket.records.len();
        }

        assert_eq!(total, dir.len, "record count");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::BuildIdentityHasher;
    use std::hash::BuildHasherDefault;
    use std::hash::Hasher;

    fn identity_table<V: Clone>(bucket_size: usize) -> ExtendibleHashTable<u64, V, BuildIdentityHasher> {
        ExtendibleHashTable::with_hasher(bucket_size, BuildIdentityHasher::default())
    }

    /// Hashes everything to the same value.
    #[derive(Default)]
    struct ConstantHasher;

    impl Hasher for ConstantHasher {
        fn finish(&self) -> u64 {
            0
        }
        fn write(&mut self, _bytes: &[u8]) {}
    }

    #[test]
    fn test_sample() {
        let table = ExtendibleHashTable::new(2);

        for i in 1..=9 {
            table.insert(i, format!("v{}", i));
        }
        table.verify_integrity();

        assert_eq!(table.find(&1), Some("v1".to_string()));
        assert_eq!(table.find(&9), Some("v9".to_string()));
        assert_eq!(table.find(&10), None);
        assert_eq!(table.len(), 9);

        assert!(table.remove(&8));
        assert!(table.remove(&4));
        assert!(table.remove(&1));
        assert!(!table.remove(&20));
        assert_eq!(table.find(&8), None);
        assert_eq!(table.len(), 6);
        table.verify_integrity();
    }

    #[test]
    fn test_split_doubles_directory_once() {
        let table = identity_table(1);
        assert_eq!(table.global_depth(), 0);
        assert_eq!(table.bucket_count(), 1);

        table.insert(0, 'a');
        table.insert(1, 'b');

        assert_eq!(table.global_depth(), 1);
        assert_eq!(table.bucket_count(), 2);
        assert_eq!(table.local_depth(0), Some(1));
        assert_eq!(table.local_depth(1), Some(1));
        assert_eq!(table.local_depth(2), None);
        assert_eq!(table.find(&0), Some('a'));
        assert_eq!(table.find(&1), Some('b'));
        table.verify_integrity();
    }

    #[test]
    fn test_split_without_doubling() {
        let table = identity_table(2);

        // 0b000, 0b100 fill the single bucket; 0b001 forces depth 1.
        table.insert(0, ());
        table.insert(4, ());
        table.insert(1, ());
        assert_eq!(table.global_depth(), 1);

        // 0b011 joins 0b001 in the odd bucket (depth 1, not full yet).
        table.insert(3, ());
        assert_eq!(table.global_depth(), 1);

        // Even bucket overflows and must double: depth 2.
        table.insert(2, ());
        assert_eq!(table.global_depth(), 2);
        assert_eq!(table.local_depth(0b00), Some(2));
        assert_eq!(table.local_depth(0b10), Some(2));
        // Odd bucket is still shared by slots 0b01 and 0b11.
        assert_eq!(table.local_depth(0b01), Some(1));
        assert_eq!(table.local_depth(0b11), Some(1));

        // Splitting the odd bucket now needs no doubling.
        table.insert(5, ());
        assert_eq!(table.global_depth(), 2);
        assert_eq!(table.local_depth(0b01), Some(2));
        assert_eq!(table.local_depth(0b11), Some(2));
        assert_eq!(table.bucket_count(), 4);

        for k in [0, 1, 2, 3, 4, 5] {
            assert!(table.contains_key(&k), "missing {}", k);
        }
        table.verify_integrity();
    }

    #[test]
    fn test_repeated_split_until_relieved() {
        let table = identity_table(1);

        // 0 and 8 agree on the low three bits: four doublings needed.
        table.insert(0, 0);
        table.insert(8, 8);

        assert_eq!(table.global_depth(), 4);
        assert_eq!(table.find(&0), Some(0));
        assert_eq!(table.find(&8), Some(8));
        table.verify_integrity();
    }

    #[test]
    fn test_insert_overwrites() {
        let table = identity_table(1);
        table.insert(3, "old");
        table.insert(3, "new");

        assert_eq!(table.find(&3), Some("new"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.global_depth(), 0);
    }

    #[test]
    fn test_remove_does_not_shrink() {
        let table = identity_table(1);
        for k in 0..8 {
            table.insert(k, k);
        }
        let depth = table.global_depth();
        let buckets = table.bucket_count();

        for k in 0..8 {
            assert!(table.remove(&k));
        }

        assert!(table.is_empty());
        assert_eq!(table.global_depth(), depth);
        assert_eq!(table.bucket_count(), buckets);
        table.verify_integrity();
    }

    #[test]
    fn test_identical_hashes_overflow_instead_of_looping() {
        let table: ExtendibleHashTable<u32, u32, BuildHasherDefault<ConstantHasher>> =
            ExtendibleHashTable::with_hasher(2, BuildHasherDefault::default());

        for k in 0..10 {
            table.insert(k, k * 10);
        }

        assert_eq!(table.global_depth(), 0);
        assert_eq!(table.len(), 10);
        for k in 0..10 {
            assert_eq!(table.find(&k), Some(k * 10));
        }
        table.verify_integrity();
    }

    #[test]
    #[should_panic(expected = "bucket_size must be > 0")]
    fn test_zero_bucket_size_panics() {
        let _ = identity_table::<u8>(0);
    }

    #[test]
    fn test_concurrent_insert() {
        use std::sync::Arc;
        use std::thread;

        let table = Arc::new(ExtendibleHashTable::new(4));
        let mut handles = vec![];

        for t in 0..4u64 {
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || {
                for i in 0..250u64 {
                    let key = t * 1000 + i;
                    table.insert(key, key);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 1000);
        for t in 0..4u64 {
            for i in 0..250u64 {
                let key = t * 1000 + i;
                assert_eq!(table.find(&key), Some(key));
            }
        }
        table.verify_integrity();
    }
}
