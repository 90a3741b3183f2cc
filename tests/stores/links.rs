//! Link Tests

use crate::common::*;

fn db() -> Database {
    let db = Database::ephemeral(blog_schema()).unwrap();
    populate(&db);
    db
}

#[test]
fn children_follow_link_orders() {
    let db = db();
    let ada = Record::new().with("user_id", "u1");
    let posts = db
        .read(|tx| tx.link("user_posts")?.filter(Some(&ada), None, None))
        .unwrap();
    assert_eq!(strings(&posts, "post_id"), ["p3", "p1"]);

    let first = &posts[0];
    let rest = db
        .read(|tx| tx.link("user_posts")?.filter(Some(&ada), Some(first), Some(10)))
        .unwrap();
    assert_eq!(strings(&rest, "post_id"), ["p1"]);
}

#[test]
fn children_without_parent_are_orphans() {
    let db = db();
    let orphans = db
        .read(|tx| tx.link("user_posts")?.filter(None, None, None))
        .unwrap();
    assert_eq!(strings(&orphans, "post_id"), ["p4"]);
}

#[test]
fn lookup_returns_parent_or_none() {
    let db = db();
    let parent = db
        .read(|tx| {
            let post = tx.store("posts")?.lookup(&Record::new().with("post_id", "p2"))?;
            tx.link("user_posts")?.lookup(&post)
        })
        .unwrap();
    assert_eq!(parent, Some(user("u2", "Grace", "Arlington", 85)));

    let orphan_parent = db
        .read(|tx| {
            let post = tx.store("posts")?.lookup(&Record::new().with("post_id", "p4"))?;
            tx.link("user_posts")?.lookup(&post)
        })
        .unwrap();
    assert_eq!(orphan_parent, None);
}

#[test]
fn children_follow_reassignment() {
    let db = db();
    db.write(|tx| {
        tx.store_mut("posts")?
            .update(&Record::new().with("post_id", "p4").with("user_id", "u2"))?;
        Ok(())
    })
    .unwrap();
    let grace = Record::new().with("user_id", "u2");
    let posts = db
        .read(|tx| tx.link("user_posts")?.filter(Some(&grace), None, None))
        .unwrap();
    assert_eq!(strings(&posts, "post_id"), ["p2", "p4"]);
    let orphans = db
        .read(|tx| tx.link("user_posts")?.filter(None, None, None))
        .unwrap();
    assert!(orphans.is_empty());
}

#[test]
fn unknown_link_is_a_schema_error() {
    let db = db();
    let error = db
        .read(|tx| tx.link("user_likes")?.filter(None, None, None))
        .unwrap_err();
    assert!(matches!(error, Error::Schema(_)));
}
