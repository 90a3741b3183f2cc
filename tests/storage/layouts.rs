//! File Layout Tests
//!
//! Every combination of log granularity and read cache stores the same
//! records and survives a reopen.

use crate::common::*;

fn layouts() -> Vec<DatabaseConfig> {
    vec![
        DatabaseConfig::default(),
        DatabaseConfig {
            page_size_log2: Some(9),
            ..DatabaseConfig::default()
        },
        DatabaseConfig {
            max_cached_pages: Some(4),
            ..DatabaseConfig::default()
        },
        DatabaseConfig {
            page_size_log2: Some(12),
            max_cached_pages: Some(16),
            ..DatabaseConfig::default()
        },
    ]
}

#[test]
fn every_layout_survives_reopen() {
    for config in layouts() {
        let mut test_db = TestDb::with_config(config.clone(), blog_schema());
        populate(test_db.db());
        let db = test_db.reopen(blog_schema()).unwrap();
        let names = db
            .read(|tx| tx.store("users")?.filter(&Filters::new(), None, None, None))
            .unwrap();
        assert_eq!(strings(&names, "name"), ["Ada", "Alan", "Grace"], "{:?}", config);
        let posts = db.read(|tx| tx.store("posts")?.length()).unwrap();
        assert_eq!(posts, 4, "{:?}", config);
    }
}

#[test]
fn ephemeral_layouts_roll_back() {
    for config in layouts() {
        let db = Database::builder()
            .config(config)
            .schema(blog_schema())
            .open()
            .unwrap();
        populate(&db);
        let result = db.write(|tx| {
            tx.store_mut("users")?.vacate()?;
            tx.store_mut("posts")?.vacate()?;
            Err::<(), _>(atlas_core::Error::InvalidOperation("abandoned".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(db.read(|tx| tx.store("users")?.length()).unwrap(), 3);
        assert_eq!(db.read(|tx| tx.store("posts")?.length()).unwrap(), 4);
    }
}

#[test]
fn database_files_are_created() {
    let test_db = TestDb::new(blog_schema());
    let path = test_db.dir.path().join("db");
    assert!(path.join(atlasdb::DATA_FILE).exists());
    assert!(path.join(atlasdb::LOG_FILE).exists());
    assert!(!test_db.db().is_ephemeral());
}
