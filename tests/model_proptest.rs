//! Property tests: each component against a simple reference model.

use std::collections::{HashMap, VecDeque};

use pagepool::buffer::replacer::{LruReplacer, Replacer};
use pagepool::hash::ExtendibleHashTable;
use pagepool::{BufferPoolManager, Error, MemoryStore, PageId};
use proptest::prelude::*;

// ============================================================================
// Extendible hash table vs HashMap
// ============================================================================

#[derive(Debug, Clone)]
enum TableOp {
    Insert(u16, u32),
    Remove(u16),
    Find(u16),
}

fn table_op() -> impl Strategy<Value = TableOp> {
    prop_oneof![
        3 => (0u16..256, any::<u32>()).prop_map(|(k, v)| TableOp::Insert(k, v)),
        1 => (0u16..256).prop_map(TableOp::Remove),
        1 => (0u16..256).prop_map(TableOp::Find),
    ]
}

proptest! {
    #[test]
    fn hash_table_matches_hashmap(
        bucket_size in 1usize..6,
        ops in prop::collection::vec(table_op(), 1..300),
    ) {
        let table = ExtendibleHashTable::new(bucket_size);
        let mut model = HashMap::new();
        let mut last_depth = 0;

        for op in ops {
            match op {
                TableOp::Insert(k, v) => {
                    table.insert(k, v);
                    model.insert(k, v);
                }
                TableOp::Remove(k) => {
                    prop_assert_eq!(table.remove(&k), model.remove(&k).is_some());
                }
                TableOp::Find(k) => {
                    prop_assert_eq!(table.find(&k), model.get(&k).copied());
                }
            }

            // The directory never shrinks.
            prop_assert!(table.global_depth() >= last_depth);
            last_depth = table.global_depth();
            prop_assert_eq!(table.len(), model.len());
        }

        table.verify_integrity();
        for (k, v) in &model {
            prop_assert_eq!(table.find(k), Some(*v));
        }
    }
}

// ============================================================================
// LRU replacer vs VecDeque
// ============================================================================

#[derive(Debug, Clone)]
enum ReplacerOp {
    Insert(u8),
    Erase(u8),
    Victim,
}

fn replacer_op() -> impl Strategy<Value = ReplacerOp> {
    prop_oneof![
        3 => (0u8..16).prop_map(ReplacerOp::Insert),
        1 => (0u8..16).prop_map(ReplacerOp::Erase),
        2 => Just(ReplacerOp::Victim),
    ]
}

proptest! {
    #[test]
    fn lru_matches_model(ops in prop::collection::vec(replacer_op(), 1..200)) {
        let replacer = LruReplacer::new();
        // Front is least recently used.
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                ReplacerOp::Insert(v) => {
                    replacer.insert(v);
                    model.retain(|&x| x != v);
                    model.push_back(v);
                }
                ReplacerOp::Erase(v) => {
                    let tracked = model.contains(&v);
                    model.retain(|&x| x != v);
                    prop_assert_eq!(replacer.erase(&v), tracked);
                }
                ReplacerOp::Victim => {
                    prop_assert_eq!(replacer.victim(), model.pop_front());
                }
            }
            prop_assert_eq!(replacer.size(), model.len());
        }
    }
}

// ============================================================================
// Buffer pool vs pin model
// ============================================================================

#[derive(Debug, Clone)]
enum PoolOp {
    New,
    Fetch(usize),
    Unpin(usize, bool),
    Flush(usize),
    Delete(usize),
}

fn pool_op() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        2 => Just(PoolOp::New),
        3 => any::<usize>().prop_map(PoolOp::Fetch),
        3 => (any::<usize>(), any::<bool>()).prop_map(|(i, d)| PoolOp::Unpin(i, d)),
        1 => any::<usize>().prop_map(PoolOp::Flush),
        1 => any::<usize>().prop_map(PoolOp::Delete),
    ]
}

fn stamp(pid: PageId) -> [u8; 4] {
    pid.0.to_le_bytes()
}

proptest! {
    #[test]
    fn pool_keeps_frames_partitioned(
        pool_size in 1usize..5,
        ops in prop::collection::vec(pool_op(), 1..150),
    ) {
        let bpm = BufferPoolManager::new(pool_size, MemoryStore::new());
        // Live pages and the pins this test holds on each.
        let mut pins: Vec<(PageId, u32)> = Vec::new();

        for op in ops {
            let pinned_pages = pins.iter().filter(|(_, n)| *n > 0).count();

            match op {
                PoolOp::New => match bpm.new_page() {
                    Ok((pid, frame)) => {
                        frame.page_mut().as_mut_slice()[..4].copy_from_slice(&stamp(pid));
                        bpm.flush_page(pid).unwrap();
                        pins.push((pid, 1));
                    }
                    Err(Error::NoFreeFrames) => prop_assert_eq!(pinned_pages, pool_size),
                    Err(e) => return Err(TestCaseError::fail(e.to_string())),
                },
                PoolOp::Fetch(i) if !pins.is_empty() => {
                    let idx = i % pins.len();
                    let pid = pins[idx].0;
                    match bpm.fetch_page(pid) {
                        Ok(frame) => {
                            let head: [u8; 4] = frame.page().as_slice()[..4].try_into().unwrap();
                            prop_assert_eq!(head, stamp(pid));
                            pins[idx].1 += 1;
                        }
                        Err(Error::NoFreeFrames) => prop_assert_eq!(pinned_pages, pool_size),
                        Err(e) => return Err(TestCaseError::fail(e.to_string())),
                    }
                }
                PoolOp::Unpin(i, dirty) if !pins.is_empty() => {
                    let idx = i % pins.len();
                    let (pid, held) = pins[idx];
                    let result = bpm.unpin_page(pid, dirty);
                    if held > 0 {
                        prop_assert!(result.is_ok());
                        pins[idx].1 -= 1;
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                PoolOp::Flush(i) if !pins.is_empty() => {
                    let pid = pins[i % pins.len()].0;
                    match bpm.flush_page(pid) {
                        Ok(()) => prop_assert_eq!(bpm.is_dirty(pid), Some(false)),
                        Err(Error::PageNotResident(_)) => prop_assert_eq!(bpm.pin_count(pid), None),
                        Err(e) => return Err(TestCaseError::fail(e.to_string())),
                    }
                }
                PoolOp::Delete(i) if !pins.is_empty() => {
                    let idx = i % pins.len();
                    let (pid, held) = pins[idx];
                    match bpm.delete_page(pid) {
                        Ok(()) => {
                            prop_assert_eq!(held, 0);
                            pins.swap_remove(idx);
                        }
                        Err(Error::PagePinned(_)) => prop_assert!(held > 0),
                        Err(Error::PageNotResident(_)) => prop_assert_eq!(held, 0),
                        Err(e) => return Err(TestCaseError::fail(e.to_string())),
                    }
                }
                _ => {}
            }

            bpm.verify_integrity();
            for &(pid, held) in &pins {
                match bpm.pin_count(pid) {
                    Some(n) => prop_assert_eq!(n, held),
                    None => prop_assert_eq!(held, 0),
                }
            }
        }
    }
}
