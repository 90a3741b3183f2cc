//! Filter Tests

use crate::common::*;

fn db() -> Database {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    db
}

fn filter_users(
    db: &Database,
    filters: &Filters,
    orders: Option<&Orders>,
    anchor: Option<&Record>,
    limit: Option<usize>,
) -> Vec<String> {
    let users = db
        .read(|tx| tx.store("users")?.filter(filters, orders, anchor, limit))
        .unwrap();
    strings(&users, "user_id")
}

// ============================================================================
// Orders
// ============================================================================

#[test]
fn default_orders_apply_without_orders() {
    let db = db();
    assert_eq!(filter_users(&db, &Filters::new(), None, None, None), ["u1", "u3", "u2"]);
}

#[test]
fn explicit_orders_replace_default_orders() {
    let db = db();
    let by_age = Orders::new().with("age", Direction::Decreasing);
    assert_eq!(
        filter_users(&db, &Filters::new(), Some(&by_age), None, None),
        ["u2", "u3", "u1"]
    );
}

#[test]
fn equality_filters_combine() {
    let db = db();
    let london = Filters::new().equal("city", "London");
    assert_eq!(filter_users(&db, &london, None, None, None), ["u1", "u3"]);
    let exact = london.clone().equal("age", 41i64);
    assert_eq!(filter_users(&db, &exact, None, None, None), ["u3"]);
    let nobody = london.equal("age", 40i64);
    assert!(filter_users(&db, &nobody, None, None, None).is_empty());
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn anchor_and_limit_paginate() {
    let db = db();
    let mut pages = Vec::new();
    let mut anchor: Option<Record> = None;
    loop {
        let page = db
            .read(|tx| {
                tx.store("users")?
                    .filter(&Filters::new(), None, anchor.as_ref(), Some(2))
            })
            .unwrap();
        if page.is_empty() {
            break;
        }
        anchor = page.last().cloned();
        pages.push(strings(&page, "user_id"));
    }
    assert_eq!(pages, vec![vec!["u1", "u3"], vec!["u2"]]);
}

#[test]
fn unknown_anchor_returns_nothing() {
    let db = db();
    let anchor = Record::new().with("user_id", "u9");
    assert!(filter_users(&db, &Filters::new(), None, Some(&anchor), None).is_empty());
}

#[test]
fn anchor_follows_explicit_orders() {
    let db = db();
    let by_city = Orders::new()
        .with("city", Direction::Decreasing)
        .with("age", Direction::Increasing);
    let anchor = Record::new().with("user_id", "u1");
    assert_eq!(
        filter_users(&db, &Filters::new(), Some(&by_city), Some(&anchor), None),
        ["u3", "u2"]
    );
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn update_merges_and_insert_replaces() {
    let db = db();
    let moved = db
        .write(|tx| {
            let mut users = tx.store_mut("users")?;
            users.update(&Record::new().with("user_id", "u1").with("city", "Paris"))?;
            users.lookup(&Record::new().with("user_id", "u1"))
        })
        .unwrap();
    assert_eq!(moved, user("u1", "Ada", "Paris", 36));

    let error = db
        .write(|tx| {
            tx.store_mut("users")?
                .insert(&Record::new().with("user_id", "u1").with("name", "Ada"))
        })
        .unwrap_err();
    assert!(matches!(error, Error::ConstraintViolation(_)));

    let replaced = db
        .write(|tx| {
            let mut users = tx.store_mut("users")?;
            users.insert(&user("u1", "Ada", "London", 37))?;
            users.lookup(&Record::new().with("user_id", "u1"))
        })
        .unwrap();
    assert_eq!(replaced, user("u1", "Ada", "London", 37));
    let london = Filters::new().equal("city", "London").equal("age", 37i64);
    assert_eq!(filter_users(&db, &london, None, None, None), ["u1"]);
}

#[test]
fn unchanged_insert_reports_no_change() {
    let db = db();
    let changed = db
        .write(|tx| tx.store_mut("users")?.insert(&user("u1", "Ada", "London", 36)))
        .unwrap();
    assert!(!changed);
}

#[test]
fn lookup_of_missing_record_is_not_found() {
    let db = db();
    let error = db
        .read(|tx| tx.store("users")?.lookup(&Record::new().with("user_id", "u9")))
        .unwrap_err();
    assert!(error.is_not_found());
}
