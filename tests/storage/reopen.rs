//! Reopen Tests
//!
//! Tests for reopening a database with the same, an extended or a reduced
//! schema.

use crate::common::*;

// ============================================================================
// Same Schema
// ============================================================================

#[test]
fn records_survive_reopen() {
    let mut test_db = TestDb::new(blog_schema());
    populate(test_db.db());
    let db = test_db.reopen(blog_schema()).unwrap();

    let ada = db
        .read(|tx| tx.store("users")?.lookup(&Record::new().with("user_id", "u1")))
        .unwrap();
    assert_eq!(ada, user("u1", "Ada", "London", 36));

    let parent = Record::new().with("user_id", "u1");
    let posts = db
        .read(|tx| tx.link("user_posts")?.filter(Some(&parent), None, None))
        .unwrap();
    assert_eq!(strings(&posts, "post_id"), ["p3", "p1"]);
}

#[test]
fn rolled_back_writes_stay_rolled_back_after_reopen() {
    let mut test_db = TestDb::new(blog_schema());
    populate(test_db.db());
    let _ = test_db.db().write(|tx| {
        tx.store_mut("posts")?.remove(&Record::new().with("post_id", "p1"))?;
        tx.store_mut("nowhere")?.vacate()
    });
    let db = test_db.reopen(blog_schema()).unwrap();
    assert_eq!(db.read(|tx| tx.store("posts")?.length()).unwrap(), 4);
}

// ============================================================================
// Changed Schema
// ============================================================================

#[test]
fn new_index_is_built_on_reopen() {
    let mut test_db = TestDb::new(blog_schema());
    populate(test_db.db());

    let schema = blog_schema().store(
        "posts",
        Store::new(
            Fields::new()
                .with("post_id", Field::string(""))
                .with("user_id", Field::nullable_string(None))
                .with("title", Field::string("").searchable())
                .with("posted", Field::integer(0)),
            ["post_id"],
            Orders::new().with("posted", Direction::Increasing),
        ),
    );
    let db = test_db.reopen(schema).unwrap();
    let posts = db
        .read(|tx| tx.store("posts")?.filter(&Filters::new(), None, None, Some(2)))
        .unwrap();
    assert_eq!(strings(&posts, "post_id"), ["p1", "p3"]);
}

#[test]
fn undeclared_store_is_deleted_on_reopen() {
    let mut test_db = TestDb::new(blog_schema());
    populate(test_db.db());

    let users_only = Schema::new().store(
        "users",
        blog_schema().stores()["users"].clone(),
    );
    let db = test_db.reopen(users_only).unwrap();
    assert!(db.read(|tx| tx.store("posts")?.length()).is_err());
    assert_eq!(db.read(|tx| tx.store("users")?.length()).unwrap(), 3);

    // Declaring the store again starts it empty.
    let db = test_db.reopen(blog_schema()).unwrap();
    assert_eq!(db.read(|tx| tx.store("posts")?.length()).unwrap(), 0);
}

#[test]
fn changed_fields_are_rejected_on_reopen() {
    let mut test_db = TestDb::new(blog_schema());
    populate(test_db.db());

    let schema = Schema::new().store(
        "users",
        Store::new(
            Fields::new().with("user_id", Field::string("")),
            ["user_id"],
            Orders::new(),
        ),
    );
    let error = test_db.reopen(schema).unwrap_err();
    assert!(matches!(error, Error::Schema(_)));

    // The failed open left the files untouched.
    let db = test_db.reopen(blog_schema()).unwrap();
    assert_eq!(db.read(|tx| tx.store("users")?.length()).unwrap(), 3);
}
