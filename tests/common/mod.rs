//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub use atlasdb::prelude::*;
pub use atlasdb::DatabaseMetrics;
use tempfile::TempDir;

// ============================================================================
// Schema
// ============================================================================

/// Users, their posts, and the link between them.
pub fn blog_schema() -> Schema {
    Schema::new()
        .store(
            "users",
            Store::new(
                Fields::new()
                    .with("user_id", Field::string(""))
                    .with("name", Field::string("").searchable())
                    .with("city", Field::string(""))
                    .with("age", Field::integer(0)),
                ["user_id"],
                Orders::new().with("name", Direction::Increasing),
            )
            .index(Index::new(["city", "age"])),
        )
        .store(
            "posts",
            Store::new(
                Fields::new()
                    .with("post_id", Field::string(""))
                    .with("user_id", Field::nullable_string(None))
                    .with("title", Field::string("").searchable())
                    .with("posted", Field::integer(0)),
                ["post_id"],
                Orders::new(),
            ),
        )
        .link(
            "user_posts",
            Link::new("users", "posts", [("user_id", "user_id")])
                .orders(Orders::new().with("posted", Direction::Decreasing)),
        )
}

pub fn user(user_id: &str, name: &str, city: &str, age: i64) -> Record {
    Record::new()
        .with("user_id", user_id)
        .with("name", name)
        .with("city", city)
        .with("age", age)
}

pub fn post(post_id: &str, user_id: Option<&str>, title: &str, posted: i64) -> Record {
    Record::new()
        .with("post_id", post_id)
        .with("user_id", user_id)
        .with("title", title)
        .with("posted", posted)
}

pub fn strings(records: &[Record], field: &str) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            record
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

/// Insert the sample users and posts.
pub fn populate(db: &Database) {
    db.write(|tx| {
        let mut users = tx.store_mut("users")?;
        users.insert(&user("u1", "Ada", "London", 36))?;
        users.insert(&user("u2", "Grace", "Arlington", 85))?;
        users.insert(&user("u3", "Alan", "London", 41))?;
        let mut posts = tx.store_mut("posts")?;
        posts.insert(&post("p1", Some("u1"), "Notes on the engine", 1843))?;
        posts.insert(&post("p2", Some("u2"), "Compilers for everyone", 1952))?;
        posts.insert(&post("p3", Some("u1"), "Poetical science", 1844))?;
        posts.insert(&post("p4", None, "Anonymous notes", 1900))?;
        Ok(())
    })
    .unwrap();
}

// ============================================================================
// Database
// ============================================================================

/// Route engine logs to the test harness, once per test binary.
///
/// Set `RUST_LOG=atlas_engine=debug` to see planning decisions.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Database in a temporary directory that can be closed and reopened.
pub struct TestDb {
    pub dir: TempDir,
    pub db: Option<Database>,
    config: DatabaseConfig,
}

impl TestDb {
    pub fn new(schema: Schema) -> Self {
        Self::with_config(DatabaseConfig::default(), schema)
    }

    pub fn with_config(mut config: DatabaseConfig, schema: Schema) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        config.path = Some(dir.path().join("db"));
        let db = Database::builder()
            .config(config.clone())
            .schema(schema)
            .open()
            .unwrap();
        TestDb {
            dir,
            db: Some(db),
            config,
        }
    }

    pub fn db(&self) -> &Database {
        self.db.as_ref().unwrap()
    }

    /// Close the database and open it again with `schema`.
    pub fn reopen(&mut self, schema: Schema) -> atlasdb::Result<&Database> {
        if let Some(db) = self.db.take() {
            db.close()?;
        }
        let db = Database::builder()
            .config(self.config.clone())
            .schema(schema)
            .open()?;
        Ok(self.db.insert(db))
    }
}
