//! Model Tests
//!
//! Random workloads checked against an in-memory model of the store.

use crate::common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

fn items_schema() -> Schema {
    Schema::new().store(
        "items",
        Store::new(
            Fields::new()
                .with("id", Field::integer(0))
                .with("group", Field::integer(0))
                .with("label", Field::string("")),
            ["id"],
            Orders::new(),
        )
        .index(Index::new(["group", "label"])),
    )
}

fn item(id: i64, group: i64, label: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("group", group)
        .with("label", label)
}

fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|record| record.get("id").and_then(Value::as_i64).unwrap())
        .collect()
}

#[test]
fn random_workload_matches_model() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let db = Database::ephemeral(items_schema()).unwrap();
    let mut model: BTreeMap<i64, (i64, String)> = BTreeMap::new();

    for round in 0..20 {
        let operations: Vec<(u8, i64, i64, String)> = (0..25)
            .map(|_| {
                let label: String = (0..3).map(|_| rng.gen_range(b'a'..=b'e') as char).collect();
                (rng.gen_range(0..3), rng.gen_range(0..60), rng.gen_range(0..4), label)
            })
            .collect();
        // Every third batch fails and must leave no trace.
        let abort = round % 3 == 2;
        let result = db.write(|tx| {
            let mut items = tx.store_mut("items")?;
            for (kind, id, group, label) in &operations {
                match kind {
                    0 => {
                        items.insert(&item(*id, *group, label))?;
                    }
                    1 => items.remove(&Record::new().with("id", *id))?,
                    _ => {
                        items.update(&Record::new().with("id", *id).with("group", *group))?;
                    }
                }
            }
            if abort {
                return Err(atlas_core::Error::InvalidOperation("abort".to_string()));
            }
            Ok(())
        });
        assert_eq!(result.is_err(), abort);
        if !abort {
            for (kind, id, group, label) in operations {
                match kind {
                    0 => {
                        model.insert(id, (group, label));
                    }
                    1 => {
                        model.remove(&id);
                    }
                    _ => {
                        let entry = model.entry(id).or_insert((0, String::new()));
                        entry.0 = group;
                    }
                }
            }
        }

        let all = db
            .read(|tx| tx.store("items")?.filter(&Filters::new(), None, None, None))
            .unwrap();
        assert_eq!(ids(&all), model.keys().copied().collect::<Vec<_>>());

        let group = rng.gen_range(0..4);
        let orders = Orders::new().with("label", Direction::Decreasing);
        let filtered = db
            .read(|tx| {
                tx.store("items")?
                    .filter(&Filters::new().equal("group", group), Some(&orders), None, None)
            })
            .unwrap();
        let mut expected: Vec<(&String, i64)> = model
            .iter()
            .filter(|(_, (g, _))| *g == group)
            .map(|(id, (_, label))| (label, *id))
            .collect();
        expected.sort_by(|a, b| b.0.cmp(a.0).then(a.1.cmp(&b.1)));
        assert_eq!(
            ids(&filtered),
            expected.iter().map(|(_, id)| *id).collect::<Vec<_>>()
        );
    }
}

#[test]
fn pages_concatenate_to_full_result() {
    let mut rng = StdRng::seed_from_u64(7);
    let db = Database::ephemeral(items_schema()).unwrap();
    db.write(|tx| {
        let mut items = tx.store_mut("items")?;
        for id in 0..200 {
            let label: String = (0..2).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            items.insert(&item(id, id % 3, &label))?;
        }
        Ok(())
    })
    .unwrap();

    for orders in [
        Orders::new().with("label", Direction::Increasing),
        Orders::new()
            .with("group", Direction::Decreasing)
            .with("label", Direction::Increasing),
        Orders::new().with("id", Direction::Decreasing),
    ] {
        let full = db
            .read(|tx| tx.store("items")?.filter(&Filters::new(), Some(&orders), None, None))
            .unwrap();
        let mut paged = Vec::new();
        let mut anchor: Option<Record> = None;
        loop {
            let page = db
                .read(|tx| {
                    tx.store("items")?
                        .filter(&Filters::new(), Some(&orders), anchor.as_ref(), Some(17))
                })
                .unwrap();
            if page.is_empty() {
                break;
            }
            anchor = page.last().cloned();
            paged.extend(page);
        }
        assert_eq!(ids(&paged), ids(&full), "{:?}", orders);
    }
}
