//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the eviction index ordering and the slot store's
//! read-back and space reuse guarantees.

use proptest::prelude::*;
use std::collections::HashMap;
use tempfile::TempDir;

use crate::cache::{EvictionIndex, NodeId, SlotFileStore, StoreOptions, Utf8Codec, NEVER};

// == Strategies ==
/// Generates valid cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_map(|s| s)
}

/// Generates values of varying length
fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

#[derive(Debug, Clone)]
enum IndexOp {
    Insert(i32),
    Reposition { pick: usize, value: i32 },
    Remove { pick: usize },
}

fn index_op_strategy() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        (-100i32..100).prop_map(IndexOp::Insert),
        (any::<usize>(), -100i32..100).prop_map(|(pick, value)| IndexOp::Reposition { pick, value }),
        any::<usize>().prop_map(|pick| IndexOp::Remove { pick }),
    ]
}

#[derive(Debug, Clone)]
enum StoreOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(key, value)| StoreOp::Put { key, value }),
        1 => key_strategy().prop_map(|key| StoreOp::Delete { key }),
    ]
}

fn open_store(dir: &TempDir) -> SlotFileStore<String> {
    SlotFileStore::open(dir.path().join("prop.dat"), Utf8Codec, StoreOptions::default()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // The index stays sorted ascending after every operation, and maximum()
    // and minimum() always agree with the true extremes.
    #[test]
    fn prop_index_stays_sorted(ops in prop::collection::vec(index_op_strategy(), 1..80)) {
        let mut index: EvictionIndex<i32> = EvictionIndex::default();
        let mut handles: Vec<NodeId> = Vec::new();

        for op in ops {
            match op {
                IndexOp::Insert(v) => handles.push(index.insert(v)),
                IndexOp::Reposition { pick, value } if !handles.is_empty() => {
                    let id = handles[pick % handles.len()];
                    *index.get_mut(id).unwrap() = value;
                    index.reposition(id);
                }
                IndexOp::Remove { pick } if !handles.is_empty() => {
                    let id = handles.swap_remove(pick % handles.len());
                    prop_assert!(index.remove(id).is_some());
                }
                _ => {}
            }

            let values: Vec<i32> = index.iter().copied().collect();
            prop_assert_eq!(values.len(), handles.len());
            prop_assert!(values.windows(2).all(|w| w[0] <= w[1]), "unsorted: {:?}", values);
            prop_assert_eq!(index.maximum(), values.iter().max());
            prop_assert_eq!(index.minimum(), values.iter().min());
        }
    }

    // Every value written and not deleted reads back byte for byte, before
    // and after a reload from disk.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    store.put(key.clone(), &value, NEVER).unwrap();
                    model.insert(key, value);
                }
                StoreOp::Delete { key } => {
                    let existed = store.delete(&key).unwrap();
                    prop_assert_eq!(existed, model.remove(&key).is_some());
                }
            }
        }

        for (key, value) in &model {
            let stored = store.get(key).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(value));
        }
        prop_assert_eq!(store.len(), model.len());
        prop_assert_eq!(store.eviction_index().len(), model.len());

        let lost_before = store.lost_space();
        store.close().unwrap();
        let mut store = open_store(&dir);
        prop_assert_eq!(store.lost_space(), lost_before);
        for (key, value) in &model {
            let stored = store.get(key).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(value));
        }
    }

    // Writing something no larger than a deleted entry never grows the file.
    #[test]
    fn prop_deleted_capacity_is_reused(
        first in value_strategy(),
        shrink in 0usize..64,
    ) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        store.put("victim".to_string(), &first, NEVER).unwrap();
        store.delete(&"victim".to_string()).unwrap();
        let len = store.file_len();

        let smaller = &first[..first.len().saturating_sub(shrink)];
        store.put("heir".to_string(), smaller, NEVER).unwrap();
        prop_assert_eq!(store.file_len(), len);
        prop_assert!(store.free_slots().is_empty());
    }

    // Defragmenting keeps every live value and removes all free slots.
    #[test]
    fn prop_defragment_preserves_live_values(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    store.put(key.clone(), &value, NEVER).unwrap();
                    model.insert(key, value);
                }
                StoreOp::Delete { key } => {
                    store.delete(&key).unwrap();
                    model.remove(&key);
                }
            }
        }

        let slack: u64 = model.keys().map(|k| store.slot(k).unwrap().slack()).sum();
        store.defragment().unwrap();

        prop_assert!(store.free_slots().is_empty());
        prop_assert_eq!(store.lost_space(), slack);
        for (key, value) in &model {
            let stored = store.get(key).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(value));
        }
    }
}
