//! Performance Guards
//!
//! An index serving the requested orders must read only the records it
//! returns.

use atlas_core::{Field, Fields, Filters, Orders, Record};
use atlas_engine::{Index, StoreManager};
use atlas_storage::{BlockManager, VirtualFile};
use std::time::{Duration, Instant};

const RECORDS: i64 = 1000;
const ROUNDS: usize = 20;

fn populated(indexed: bool) -> (BlockManager, StoreManager) {
    let mut blocks = BlockManager::open(Box::new(VirtualFile::new(0))).unwrap();
    let mut store = StoreManager::create(
        &mut blocks,
        Fields::new()
            .with("key", Field::integer(0))
            .with("payload", Field::string("")),
        vec!["key".to_string()],
        Orders::new(),
    )
    .unwrap();
    if indexed {
        store.add_index(&mut blocks, &Index::new(["key"])).unwrap();
    }
    for key in 0..RECORDS {
        let record = Record::new()
            .with("key", key)
            .with("payload", format!("payload of record {}", key));
        store.insert(&mut blocks, &record).unwrap();
    }
    (blocks, store)
}

fn fastest(blocks: &BlockManager, store: &StoreManager) -> Duration {
    (0..ROUNDS)
        .map(|_| {
            let start = Instant::now();
            let records = store
                .filter(blocks, &Filters::new(), None, None, Some(10))
                .unwrap();
            let elapsed = start.elapsed();
            assert_eq!(records.len(), 10);
            elapsed
        })
        .min()
        .unwrap_or_default()
}

#[test]
#[cfg_attr(debug_assertions, ignore = "timing guard: run with --release")]
fn indexed_limited_filter_is_much_faster_than_a_scan() {
    let (blocks, unindexed) = populated(false);
    let scan = fastest(&blocks, &unindexed);
    let (blocks, indexed) = populated(true);
    let served = fastest(&blocks, &indexed);
    assert!(
        served * 100 <= scan,
        "indexed filter took {:?}, scan took {:?}",
        served,
        scan
    );
}
