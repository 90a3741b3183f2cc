//! Transaction Integration Tests
//!
//! Tests for commit, rollback and concurrent access through the database
//! facade.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use std::sync::{Arc, Barrier};
use std::thread;

fn counters_schema() -> Schema {
    Schema::new().store(
        "counters",
        Store::new(
            Fields::new()
                .with("name", Field::string(""))
                .with("count", Field::integer(0)),
            ["name"],
            Orders::new(),
        ),
    )
}

fn count(engine: &Engine, name: &str) -> atlas_core::Result<i64> {
    match engine.store("counters")?.lookup(&Record::new().with("name", name)) {
        Ok(record) => Ok(record.get("count").and_then(Value::as_i64).unwrap_or_default()),
        Err(e) if e.is_not_found() => Ok(0),
        Err(e) => Err(e),
    }
}

fn increment(engine: &mut Engine, name: &str) -> atlas_core::Result<i64> {
    let next = count(engine, name)? + 1;
    engine
        .store_mut("counters")?
        .insert(&Record::new().with("name", name).with("count", next))?;
    Ok(next)
}

// ============================================================================
// Commit and Rollback
// ============================================================================

#[test]
fn error_inside_write_leaves_database_unchanged() {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    let before = db
        .read(|tx| tx.store("posts")?.filter(&Filters::new(), None, None, None))
        .unwrap();

    let error = db
        .write(|tx| {
            let mut posts = tx.store_mut("posts")?;
            posts.remove(&Record::new().with("post_id", "p1"))?;
            posts.insert(&post("p9", Some("u1"), "Draft", 2000))?;
            posts.lookup(&Record::new().with("post_id", "p1"))
        })
        .unwrap_err();
    assert!(error.is_not_found());

    let after = db
        .read(|tx| tx.store("posts")?.filter(&Filters::new(), None, None, None))
        .unwrap();
    assert_eq!(after, before);
    let metrics = db.metrics();
    assert_eq!(metrics.transactions_committed, 1);
    assert_eq!(metrics.transactions_rolled_back, 1);
}

#[test]
fn committed_writes_are_visible_to_later_reads() {
    let db = Database::ephemeral(counters_schema()).unwrap();
    for expected in 1..=5 {
        assert_eq!(db.write(|tx| increment(tx, "hits")).unwrap(), expected);
    }
    assert_eq!(db.read(|tx| count(tx, "hits")).unwrap(), 5);
}

#[test]
fn rollback_survives_reopen() {
    let mut test_db = TestDb::new(counters_schema());
    test_db.db().write(|tx| increment(tx, "hits")).unwrap();
    let _ = test_db.db().write(|tx| {
        increment(tx, "hits")?;
        increment(tx, "misses")?;
        Err::<(), _>(atlas_core::Error::InvalidOperation("abandoned".to_string()))
    });
    let db = test_db.reopen(counters_schema()).unwrap();
    assert_eq!(db.read(|tx| count(tx, "hits")).unwrap(), 1);
    assert_eq!(db.read(|tx| count(tx, "misses")).unwrap(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_writers_are_serialized() {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 25;
    let mut test_db = TestDb::new(counters_schema());
    let db = Arc::new(test_db.db.take().unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..INCREMENTS {
                    db.write(|tx| increment(tx, "shared")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let total = db.read(|tx| count(tx, "shared")).unwrap();
    assert_eq!(total, (THREADS * INCREMENTS) as i64);
    assert_eq!(db.metrics().transactions_committed, (THREADS * INCREMENTS) as u64);
}

#[test]
fn readers_never_see_partial_writes() {
    let db = Arc::new(Database::ephemeral(counters_schema()).unwrap());
    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for _ in 0..100 {
                db.write(|tx| {
                    increment(tx, "left")?;
                    increment(tx, "right")?;
                    Ok(())
                })
                .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..100 {
                    let (left, right) = db
                        .read(|tx| Ok((count(tx, "left")?, count(tx, "right")?)))
                        .unwrap();
                    assert_eq!(left, right);
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(db.read(|tx| count(tx, "left")).unwrap(), 100);
}
