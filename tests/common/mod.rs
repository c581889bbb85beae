// tests/common/mod.rs

#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc};

use comment_engine::{
    config::{CommentSettings, Config},
    models::{
        comment::{BodyKind, CreateCommentRequest, TargetRef, TargetType},
        event::CommentEvent,
    },
    services::{
        collaborators::{ChannelEventSink, SqlTargetDirectory},
        database,
    },
    state::AppState,
    utils::jwt::Claims,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Owner of every target registered by [`setup`].
pub const TARGET_OWNER: i64 = 900;

pub struct TestApp {
    pub pool: SqlitePool,
    pub state: AppState,
    pub targets: SqlTargetDirectory,
    pub events: UnboundedReceiver<CommentEvent>,
}

impl TestApp {
    pub fn drain_events(&mut self) -> Vec<CommentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Fresh in-memory database with migrations applied.
/// One connection only: every pool checkout must see the same memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(database::connect_options("sqlite::memory:").unwrap())
        .await
        .expect("Failed to open in-memory SQLite");

    migrate(&pool).await;
    pool
}

/// A database file shared by several connections, configured like production.
/// Returns the pool and the file path, see [`remove_database`].
pub async fn file_pool(max_connections: u32) -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("comments_{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(database::connect_options(&url).unwrap())
        .await
        .expect("Failed to open SQLite file");

    migrate(&pool).await;
    (pool, path)
}

/// Closes the pool and deletes the database file with its WAL side files.
pub async fn remove_database(pool: SqlitePool, path: PathBuf) {
    pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

async fn migrate(pool: &SqlitePool) {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .expect("Failed to migrate database");
}

pub fn test_config(settings: CommentSettings) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        comments: settings,
    }
}

pub async fn setup() -> TestApp {
    setup_with(CommentSettings::default()).await
}

pub async fn setup_with(settings: CommentSettings) -> TestApp {
    setup_on(test_pool().await, settings).await
}

/// Engine over `pool`, with posts 1 and 2 registered as targets.
pub async fn setup_on(pool: SqlitePool, settings: CommentSettings) -> TestApp {
    let targets = SqlTargetDirectory::new(pool.clone());
    for id in [1, 2] {
        targets
            .register(post(id), TARGET_OWNER)
            .await
            .expect("Failed to register target");
    }

    let (sink, events) = ChannelEventSink::new();
    let state = AppState::new(pool.clone(), test_config(settings), Arc::new(sink));

    TestApp {
        pool,
        state,
        targets,
        events,
    }
}

/// Bearer token the way the identity service mints them, valid for ten minutes.
pub fn token(user_id: i64, role: &str) -> String {
    let exp = chrono::Utc::now().timestamp() as usize + 600;
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

pub fn post(id: i64) -> TargetRef {
    TargetRef::new(TargetType::Post, id)
}

pub fn text(target: TargetRef, parent_id: Option<i64>, body: &str) -> CreateCommentRequest {
    CreateCommentRequest {
        target_type: target.target_type,
        target_id: target.target_id,
        parent_id,
        body: Some(body.to_string()),
        body_kind: BodyKind::Text,
        media_urls: Vec::new(),
    }
}

pub async fn count_rows(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}
