use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    CommentStore, TreeAssembler,
    collaborators::{AuthorOrTargetOwner, ConfiguredPolicy, EventSink, SqlTargetDirectory},
};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub comments: CommentStore,
    pub threads: TreeAssembler,
}

impl AppState {
    /// Wires the engine with the default collaborators: the `comment_targets`
    /// directory, author-or-owner deletion and the configured moderation policy.
    pub fn new(pool: SqlitePool, config: Config, events: Arc<dyn EventSink>) -> Self {
        let targets = Arc::new(SqlTargetDirectory::new(pool.clone()));
        let settings = config.comments.clone();

        let comments = CommentStore::new(
            pool.clone(),
            targets.clone(),
            Arc::new(AuthorOrTargetOwner::new(targets)),
            Arc::new(ConfiguredPolicy {
                auto_publish: settings.auto_publish,
            }),
            events,
            settings.clone(),
        );
        let threads = TreeAssembler::new(pool.clone(), settings.inline_replies);

        Self {
            pool,
            config,
            comments,
            threads,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for CommentStore {
    fn from_ref(state: &AppState) -> Self {
        state.comments.clone()
    }
}

impl FromRef<AppState> for TreeAssembler {
    fn from_ref(state: &AppState) -> Self {
        state.threads.clone()
    }
}
