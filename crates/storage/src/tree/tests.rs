use super::*;
use crate::file::VirtualFile;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use Direction::{Decreasing, Increasing};
use Relationship::*;

fn blocks() -> BlockManager {
    BlockManager::open(Box::new(VirtualFile::new(0))).unwrap()
}

fn key(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

fn run(
    tree: &RadixTree,
    blocks: &BlockManager,
    relationship: Relationship,
    parts: &[&str],
    directions: &[Direction],
) -> Vec<u64> {
    tree.filter(blocks, relationship, &key(parts), directions)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

fn live_blocks(blocks: &BlockManager) -> usize {
    (1..=blocks.allocated_ids())
        .filter(|id| blocks.is_live(*id))
        .count()
}

fn fruit_tree(blocks: &mut BlockManager) -> RadixTree {
    let mut tree = RadixTree::create(blocks).unwrap();
    for (index, word) in ["apa", "apa1", "apa3", "banan", "banan1", "banan3"]
        .iter()
        .enumerate()
    {
        tree.insert(blocks, &key(&[word]), index as u64 + 1).unwrap();
    }
    tree
}

#[test]
fn test_greater_than_empty_component_on_single_key() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    tree.insert(&mut blocks, &key(&["apa"]), 1).unwrap();
    assert_eq!(run(&tree, &blocks, Greater, &[""], &[]), vec![1]);
}

#[test]
fn test_prefix_mode() {
    let mut blocks = blocks();
    let tree = fruit_tree(&mut blocks);
    assert_eq!(run(&tree, &blocks, Prefix, &[""], &[]), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, Prefix, &["apa"], &[]), vec![1, 2, 3]);
    assert_eq!(run(&tree, &blocks, Prefix, &["apa1"], &[]), vec![2]);
    assert_eq!(run(&tree, &blocks, Prefix, &["apa2"], &[]), Vec::<u64>::new());
    assert_eq!(run(&tree, &blocks, Prefix, &["ap"], &[]), vec![1, 2, 3]);
    assert_eq!(run(&tree, &blocks, Prefix, &["apa1b"], &[]), Vec::<u64>::new());
}

#[test]
fn test_equal_mode() {
    let mut blocks = blocks();
    let tree = fruit_tree(&mut blocks);
    assert_eq!(run(&tree, &blocks, Equal, &[""], &[]), Vec::<u64>::new());
    assert_eq!(run(&tree, &blocks, Equal, &["apa"], &[]), vec![1]);
    assert_eq!(run(&tree, &blocks, Equal, &["apa1"], &[]), vec![2]);
    assert_eq!(run(&tree, &blocks, Equal, &["apa2"], &[]), Vec::<u64>::new());
    assert_eq!(run(&tree, &blocks, Equal, &["ap"], &[]), Vec::<u64>::new());
    assert_eq!(run(&tree, &blocks, Equal, &["apa1b"], &[]), Vec::<u64>::new());
}

#[test]
fn test_greater_modes() {
    let mut blocks = blocks();
    let tree = fruit_tree(&mut blocks);
    assert_eq!(run(&tree, &blocks, Greater, &[""], &[]), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, Greater, &["apa"], &[]), vec![2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, Greater, &["apa1"], &[]), vec![3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, Greater, &["apa2"], &[]), vec![3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, Greater, &["ap"], &[]), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, Greater, &["apa1b"], &[]), vec![3, 4, 5, 6]);

    assert_eq!(run(&tree, &blocks, GreaterOrEqual, &[""], &[]), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, GreaterOrEqual, &["apa"], &[]), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, GreaterOrEqual, &["apa1"], &[]), vec![2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, GreaterOrEqual, &["apa2"], &[]), vec![3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, GreaterOrEqual, &["ap"], &[]), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(run(&tree, &blocks, GreaterOrEqual, &["apa1b"], &[]), vec![3, 4, 5, 6]);
}

#[test]
fn test_less_modes() {
    let mut blocks = blocks();
    let tree = fruit_tree(&mut blocks);
    assert_eq!(run(&tree, &blocks, Less, &[""], &[]), Vec::<u64>::new());
    assert_eq!(run(&tree, &blocks, Less, &["banan"], &[]), vec![1, 2, 3]);
    assert_eq!(run(&tree, &blocks, Less, &["banan1"], &[]), vec![1, 2, 3, 4]);
    assert_eq!(run(&tree, &blocks, Less, &["banan2"], &[]), vec![1, 2, 3, 4, 5]);
    assert_eq!(run(&tree, &blocks, Less, &["bana"], &[]), vec![1, 2, 3]);
    assert_eq!(run(&tree, &blocks, Less, &["banan1b"], &[]), vec![1, 2, 3, 4, 5]);

    assert_eq!(run(&tree, &blocks, LessOrEqual, &[""], &[]), Vec::<u64>::new());
    assert_eq!(run(&tree, &blocks, LessOrEqual, &["banan"], &[]), vec![1, 2, 3, 4]);
    assert_eq!(run(&tree, &blocks, LessOrEqual, &["banan1"], &[]), vec![1, 2, 3, 4, 5]);
    assert_eq!(run(&tree, &blocks, LessOrEqual, &["banan2"], &[]), vec![1, 2, 3, 4, 5]);
    assert_eq!(run(&tree, &blocks, LessOrEqual, &["bana"], &[]), vec![1, 2, 3]);
    assert_eq!(run(&tree, &blocks, LessOrEqual, &["banan1b"], &[]), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_partial_prefix_scenario() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    for (word, value) in [("apa", 1), ("apa1", 2), ("apa3", 3), ("banan", 4)] {
        tree.insert(&mut blocks, &key(&[word]), value).unwrap();
    }
    assert_eq!(run(&tree, &blocks, Prefix, &["apa"], &[]), vec![1, 2, 3]);
    assert_eq!(run(&tree, &blocks, Equal, &["apa1"], &[]), vec![2]);
    assert_eq!(run(&tree, &blocks, Less, &["banan"], &[]), vec![1, 2, 3]);
}

#[test]
fn test_branch() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    tree.insert(&mut blocks, &key(&["one"]), 1).unwrap();
    tree.insert(&mut blocks, &key(&["one", "a"]), 2).unwrap();
    tree.insert(&mut blocks, &key(&["one", "b"]), 3).unwrap();
    tree.insert(&mut blocks, &key(&["two"]), 4).unwrap();
    tree.insert(&mut blocks, &key(&["two", "a"]), 5).unwrap();
    tree.insert(&mut blocks, &key(&["two", "b"]), 6).unwrap();

    let branch = tree.branch(&blocks, &key(&["one"])).unwrap().unwrap();
    let values: Vec<u64> = branch.iter(&blocks).unwrap().map(|v| v.unwrap()).collect();
    assert_eq!(values, vec![2, 3]);
    assert_eq!(branch.length(&blocks).unwrap(), 2);
    assert!(tree.branch(&blocks, &key(&["three"])).unwrap().is_none());
    assert!(tree.branch(&blocks, &key(&["one", "a"])).unwrap().is_none());
}

fn direction_tree(blocks: &mut BlockManager) -> RadixTree {
    let mut tree = RadixTree::create(blocks).unwrap();
    tree.insert(blocks, &key(&["a"]), 1).unwrap();
    tree.insert(blocks, &key(&["b", "1"]), 2).unwrap();
    tree.insert(blocks, &key(&["b", "2"]), 3).unwrap();
    tree.insert(blocks, &key(&["c", "1"]), 4).unwrap();
    tree.insert(blocks, &key(&["c", "2"]), 5).unwrap();
    tree.insert(blocks, &key(&["d", "1"]), 6).unwrap();
    tree.insert(blocks, &key(&["d", "2"]), 7).unwrap();
    tree
}

#[test]
fn test_directions_increasing_first_level() {
    let mut blocks = blocks();
    let tree = direction_tree(&mut blocks);
    assert_eq!(
        run(&tree, &blocks, Greater, &["a"], &[Increasing, Increasing]),
        vec![2, 3, 4, 5, 6, 7]
    );
    assert_eq!(
        run(&tree, &blocks, Greater, &["a"], &[Increasing, Decreasing]),
        vec![3, 2, 5, 4, 7, 6]
    );
}

#[test]
fn test_directions_decreasing_first_level() {
    let mut blocks = blocks();
    let tree = direction_tree(&mut blocks);
    assert_eq!(
        run(&tree, &blocks, Greater, &["a"], &[Decreasing, Increasing]),
        vec![6, 7, 4, 5, 2, 3]
    );
    assert_eq!(
        run(&tree, &blocks, Greater, &["a"], &[Decreasing, Decreasing]),
        vec![7, 6, 5, 4, 3, 2]
    );
    assert_eq!(
        run(&tree, &blocks, Less, &["a"], &[Decreasing, Increasing]),
        Vec::<u64>::new()
    );
    // A key sorts before its extensions whatever the walk order.
    assert_eq!(
        run(&tree, &blocks, Greater, &["c"], &[Decreasing, Increasing]),
        vec![6, 7, 4, 5]
    );
    assert_eq!(
        run(&tree, &blocks, Less, &["c"], &[Decreasing, Increasing]),
        vec![2, 3, 1]
    );
    assert_eq!(
        run(&tree, &blocks, Less, &["c", "2"], &[Decreasing, Decreasing]),
        vec![4, 3, 2, 1]
    );
    assert_eq!(
        run(&tree, &blocks, Prefix, &[""], &[Decreasing, Decreasing]),
        vec![7, 6, 5, 4, 3, 2, 1]
    );
}

#[test]
fn test_inclusive_bounds_follow_the_walk() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    tree.insert(&mut blocks, &key(&["b"]), 1).unwrap();
    tree.insert(&mut blocks, &key(&["b", "1"]), 2).unwrap();
    tree.insert(&mut blocks, &key(&["ba"]), 3).unwrap();
    tree.insert(&mut blocks, &key(&["a"]), 4).unwrap();
    // Decreasing components put "ba" first, the key ending at "b" comes
    // before its extensions on the increasing second level.
    assert_eq!(
        run(&tree, &blocks, GreaterOrEqual, &["b"], &[Decreasing, Increasing]),
        vec![3, 1, 2]
    );
    assert_eq!(
        run(&tree, &blocks, GreaterOrEqual, &["b"], &[Decreasing, Decreasing]),
        vec![3, 2, 1]
    );
    assert_eq!(
        run(&tree, &blocks, LessOrEqual, &["b"], &[Decreasing, Increasing]),
        vec![1, 4]
    );
}

#[test]
fn test_entries_report_keys() {
    let mut blocks = blocks();
    let tree = direction_tree(&mut blocks);
    let entries = |relationship, parts: &[&str], directions: &[Direction]| {
        tree.entries(&blocks, relationship, &key(parts), directions)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    };
    assert_eq!(
        entries(Greater, &["c"], &[Decreasing, Decreasing]),
        vec![(key(&["d", "2"]), 7), (key(&["d", "1"]), 6), (key(&["c", "2"]), 5), (key(&["c", "1"]), 4)]
    );
    assert_eq!(
        entries(Prefix, &["b"], &[]),
        vec![(key(&["b", "1"]), 2), (key(&["b", "2"]), 3)]
    );
    assert_eq!(entries(Equal, &["a"], &[]), vec![(key(&["a"]), 1)]);
}

#[test]
fn test_entries_rebuild_compressed_components() {
    let mut blocks = blocks();
    let tree = fruit_tree(&mut blocks);
    let words: Vec<Vec<Vec<u8>>> = tree
        .entries(&blocks, Prefix, &key(&["ba"]), &[])
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(words, vec![key(&["banan"]), key(&["banan1"]), key(&["banan3"])]);
}

#[test]
fn test_iteration() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    tree.insert(&mut blocks, &key(&["one"]), 1).unwrap();
    tree.insert(&mut blocks, &key(&["two"]), 2).unwrap();
    let values: Vec<u64> = tree.iter(&blocks).unwrap().map(|v| v.unwrap()).collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn test_operations_fail_after_delete() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    let empty: &[&[u8]] = &[];
    tree.delete(&mut blocks).unwrap();
    assert!(tree.branch(&blocks, empty).is_err());
    assert!(tree.delete(&mut blocks).is_err());
    assert!(tree.insert(&mut blocks, empty, 1).is_err());
    assert!(tree.length(&blocks).is_err());
    assert!(tree.lookup(&blocks, empty).is_err());
    assert!(tree.remove(&mut blocks, empty).is_err());
    assert!(tree.filter(&blocks, Equal, empty, &[]).is_err());
    assert!(tree.vacate(&mut blocks).is_err());
    assert_eq!(live_blocks(&blocks), 0);
}

#[test]
fn test_empty_key_values() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    let empty: &[&[u8]] = &[];
    assert_eq!(tree.lookup(&blocks, empty).unwrap(), None);
    tree.remove(&mut blocks, empty).unwrap();
    tree.insert(&mut blocks, empty, 1).unwrap();
    assert_eq!(tree.lookup(&blocks, empty).unwrap(), Some(1));
    tree.insert(&mut blocks, empty, 1).unwrap();
    assert_eq!(tree.lookup(&blocks, empty).unwrap(), Some(1));
    assert_eq!(tree.length(&blocks).unwrap(), 1);
    let values: Vec<u64> = tree.iter(&blocks).unwrap().map(|v| v.unwrap()).collect();
    assert_eq!(values, vec![1]);
    tree.remove(&mut blocks, empty).unwrap();
    assert_eq!(tree.lookup(&blocks, empty).unwrap(), None);
}

#[test]
fn test_length_tracks_values() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 0);
    tree.insert(&mut blocks, &key(&["a"]), 1).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 1);
    tree.insert(&mut blocks, &key(&["b"]), 2).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 2);
    tree.insert(&mut blocks, &key(&["b"]), 3).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 2);
    tree.remove(&mut blocks, &key(&["b"])).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 1);
    tree.remove(&mut blocks, &key(&["b"])).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 1);
    tree.remove(&mut blocks, &key(&["a"])).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 0);
}

#[test]
fn test_remove_collapses_nodes() {
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    let keys = [
        key(&["apa"]),
        key(&["apa1"]),
        key(&["apa", "x"]),
        key(&["banan", "y", "z"]),
        key(&["band"]),
    ];
    for (value, k) in keys.iter().enumerate() {
        tree.insert(&mut blocks, k, value as u64).unwrap();
    }
    assert!(live_blocks(&blocks) > 1);
    tree.remove(&mut blocks, &keys[1]).unwrap();
    assert_eq!(tree.lookup(&blocks, &keys[0]).unwrap(), Some(0));
    assert_eq!(tree.lookup(&blocks, &keys[4]).unwrap(), Some(4));
    for k in &keys {
        tree.remove(&mut blocks, k).unwrap();
    }
    assert_eq!(tree.length(&blocks).unwrap(), 0);
    assert_eq!(live_blocks(&blocks), 1);
}

#[test]
fn test_vacate_keeps_root() {
    let mut blocks = blocks();
    let mut tree = fruit_tree(&mut blocks);
    tree.vacate(&mut blocks).unwrap();
    assert_eq!(tree.length(&blocks).unwrap(), 0);
    assert_eq!(live_blocks(&blocks), 1);
    tree.insert(&mut blocks, &key(&["again"]), 9).unwrap();
    assert_eq!(tree.lookup(&blocks, &key(&["again"])).unwrap(), Some(9));
}

#[test]
fn test_relationship_parse() {
    for symbol in ["^=", "=", ">", ">=", "<", "<="] {
        let relationship: Relationship = symbol.parse().unwrap();
        assert_eq!(relationship.to_string(), symbol);
    }
    assert!("!=".parse::<Relationship>().is_err());
}

// =============================================================================
// Model-based ordering properties
// =============================================================================

#[test]
fn test_random_churn_matches_model() {
    let mut rng = StdRng::seed_from_u64(0x7ee);
    let mut blocks = blocks();
    let mut tree = RadixTree::create(&mut blocks).unwrap();
    let mut model: BTreeMap<Vec<Vec<u8>>, u64> = BTreeMap::new();
    for round in 0..400u64 {
        let k: Vec<Vec<u8>> = (0..rng.gen_range(1..4))
            .map(|_| (0..rng.gen_range(0..4)).map(|_| rng.gen_range(0..4u8) * 0x41).collect())
            .collect();
        if rng.gen_bool(0.3) {
            tree.remove(&mut blocks, &k).unwrap();
            model.remove(&k);
        } else {
            tree.insert(&mut blocks, &k, round).unwrap();
            model.insert(k, round);
        }
        if round % 50 == 49 {
            let entries = tree
                .entries(&blocks, Greater, &[] as &[&[u8]], &[])
                .unwrap()
                .collect::<Result<Vec<_>>>()
                .unwrap();
            let expected: Vec<(Vec<Vec<u8>>, u64)> =
                model.iter().map(|(k, v)| (k.clone(), *v)).collect();
            assert_eq!(entries, expected, "after round {}", round);
        }
    }
    for k in model.keys() {
        tree.remove(&mut blocks, k).unwrap();
    }
    assert_eq!(tree.length(&blocks).unwrap(), 0);
    assert_eq!(live_blocks(&blocks), 1);
}

fn compare_components(a: &[u8], b: &[u8], direction: Direction) -> Ordering {
    match direction {
        Increasing => a.cmp(b),
        Decreasing => b.cmp(a),
    }
}

/// Order of two keys under per-level directions. No directions means the
/// increasing order relationships are decided by.
fn compare_keys(a: &[Vec<u8>], b: &[Vec<u8>], directions: &[Direction]) -> Ordering {
    let direction = |level: usize| directions.get(level).copied().unwrap_or_default();
    for level in 0..a.len().min(b.len()) {
        let ordering = compare_components(&a[level], &b[level], direction(level));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let shorter_first = a.len().cmp(&b.len());
    match direction(a.len().min(b.len())) {
        Increasing => shorter_first,
        Decreasing => shorter_first.reverse(),
    }
}

fn component() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(0x00u8), Just(0x01), Just(0x10), Just(0xff)], 0..3)
}

fn tree_key() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(component(), 1..3)
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Increasing), Just(Decreasing)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_filter_matches_model(
        inserted in proptest::collection::vec(tree_key(), 0..24),
        removed in proptest::collection::vec(tree_key(), 0..6),
        query in tree_key(),
        directions in proptest::collection::vec(direction(), 0..3),
    ) {
        let mut blocks = blocks();
        let mut tree = RadixTree::create(&mut blocks).unwrap();
        let mut model: BTreeMap<Vec<Vec<u8>>, u64> = BTreeMap::new();
        for (value, k) in inserted.iter().enumerate() {
            tree.insert(&mut blocks, k, value as u64).unwrap();
            model.insert(k.clone(), value as u64);
        }
        for k in &removed {
            tree.remove(&mut blocks, k).unwrap();
            model.remove(k);
        }
        prop_assert_eq!(tree.length(&blocks).unwrap(), model.len() as u64);

        let mut ordered: Vec<(&Vec<Vec<u8>>, u64)> = model.iter().map(|(k, v)| (k, *v)).collect();
        ordered.sort_by(|a, b| compare_keys(a.0, b.0, &directions));

        let expect = |keep: &dyn Fn(&Vec<Vec<u8>>) -> bool| -> Vec<u64> {
            ordered.iter().filter(|(k, _)| keep(k)).map(|(_, v)| *v).collect()
        };
        let actual = |relationship: Relationship| -> Vec<u64> {
            tree.filter(&blocks, relationship, &query, &directions)
                .unwrap()
                .collect::<Result<Vec<_>>>()
                .unwrap()
        };
        let order = |k: &Vec<Vec<u8>>| compare_keys(k, &query, &[]);

        prop_assert_eq!(actual(Greater), expect(&|k| order(k) == Ordering::Greater));
        prop_assert_eq!(actual(GreaterOrEqual), expect(&|k| order(k) != Ordering::Less));
        prop_assert_eq!(actual(Less), expect(&|k| order(k) == Ordering::Less));
        prop_assert_eq!(actual(LessOrEqual), expect(&|k| order(k) != Ordering::Greater));
        prop_assert_eq!(actual(Equal), expect(&|k| k == &query));
        let last = query.len() - 1;
        prop_assert_eq!(
            actual(Prefix),
            expect(&|k| k.len() >= query.len()
                && k[..last] == query[..last]
                && k[last].starts_with(&query[last]))
        );
        for (k, v) in &model {
            prop_assert_eq!(tree.lookup(&blocks, k).unwrap(), Some(*v));
        }
    }

    #[test]
    fn prop_removing_everything_frees_nodes(
        inserted in proptest::collection::vec(tree_key(), 0..24),
    ) {
        let mut blocks = blocks();
        let mut tree = RadixTree::create(&mut blocks).unwrap();
        for (value, k) in inserted.iter().enumerate() {
            tree.insert(&mut blocks, k, value as u64).unwrap();
        }
        for k in &inserted {
            tree.remove(&mut blocks, k).unwrap();
        }
        prop_assert_eq!(tree.length(&blocks).unwrap(), 0);
        prop_assert_eq!(live_blocks(&blocks), 1);
    }
}
