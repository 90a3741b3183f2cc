//! Search Integration Tests
//!
//! Tests for full-text search through the database facade.

#[path = "../common/mod.rs"]
mod common;

use common::*;

fn search(db: &Database, store: &str, query: &str, anchor: Option<&Record>) -> Vec<String> {
    let results = db
        .read(|tx| tx.store(store)?.search(query, anchor, None))
        .unwrap();
    let records: Vec<Record> = results.into_iter().map(|result| result.record).collect();
    let key = if store == "users" { "user_id" } else { "post_id" };
    strings(&records, key)
}

fn with_title_layout(version: SearchVersion) -> Schema {
    let posts = blog_schema().stores()["posts"]
        .clone()
        .search_index(SearchIndex::new("title").version(version));
    blog_schema().store("posts", posts)
}

// ============================================================================
// Ranking
// ============================================================================

#[test]
fn closer_matches_rank_first() {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    assert_eq!(search(&db, "posts", "notes", None), ["p4", "p1"]);
    assert_eq!(search(&db, "posts", "no", None), ["p4", "p1"]);
    assert_eq!(search(&db, "posts", "notes en", None), ["p1"]);
    assert!(search(&db, "posts", "notes zz", None).is_empty());
}

#[test]
fn ranks_never_increase() {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    let results = db
        .read(|tx| tx.store("posts")?.search("", None, None))
        .unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.windows(2).all(|pair| pair[0].rank >= pair[1].rank));
}

#[test]
fn search_resumes_after_anchor() {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    let anchor = Record::new().with("post_id", "p4");
    assert_eq!(search(&db, "posts", "notes", Some(&anchor)), ["p1"]);
    let unknown = Record::new().with("post_id", "p9");
    assert!(search(&db, "posts", "notes", Some(&unknown)).is_empty());
}

#[test]
fn search_follows_writes() {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    db.write(|tx| {
        let mut users = tx.store_mut("users")?;
        users.update(&Record::new().with("user_id", "u2").with("name", "Grace Hopper"))?;
        users.remove(&Record::new().with("user_id", "u3"))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(search(&db, "users", "hop", None), ["u2"]);
    assert_eq!(search(&db, "users", "a", None), ["u1"]);
}

// ============================================================================
// Layouts
// ============================================================================

#[test]
fn both_layouts_agree() {
    let v1 = Database::ephemeral(with_title_layout(SearchVersion::V1)).unwrap();
    let v2 = Database::ephemeral(with_title_layout(SearchVersion::V2)).unwrap();
    for db in [&v1, &v2] {
        populate(db);
        db.write(|tx| {
            let mut posts = tx.store_mut("posts")?;
            for (i, title) in ["notes notes", "engine notes", "the analytical engine", "notes on notes on notes"]
                .iter()
                .enumerate()
            {
                posts.insert(&post(&format!("q{}", i), None, title, 1900 + i as i64))?;
            }
            Ok(())
        })
        .unwrap();
    }
    for query in ["notes", "engine", "notes e", "the", "on notes", "x"] {
        assert_eq!(search(&v1, "posts", query, None), search(&v2, "posts", query, None), "{}", query);
    }
}

#[test]
fn layout_change_rebuilds_on_reopen() {
    let mut test_db = TestDb::new(with_title_layout(SearchVersion::V1));
    populate(test_db.db());
    let db = test_db.reopen(with_title_layout(SearchVersion::V2)).unwrap();
    assert_eq!(search(db, "posts", "notes", None), ["p4", "p1"]);
}
