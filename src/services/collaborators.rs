//! Seams to the systems around the engine: content modules, authorization,
//! moderation policy and notification delivery.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::{
    error::CommentError,
    models::{
        comment::{Comment, CommentStatus, TargetRef},
        event::CommentEvent,
    },
    services::moderation::ModerationGate,
};

/// Content-identity lookup owned by the content modules.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// Owner of the target, `None` if it does not exist.
    async fn owner_of(&self, target: TargetRef) -> Result<Option<i64>, CommentError>;

    /// Called after commit when a top-level comment starts or stops counting.
    async fn adjust_comment_count(&self, target: TargetRef, delta: i64)
    -> Result<(), CommentError>;
}

/// Decides whether an actor may delete a comment.
#[async_trait]
pub trait DeleteAuthorizer: Send + Sync {
    async fn can_delete(&self, actor_id: i64, comment: &Comment) -> Result<bool, CommentError>;
}

/// Chooses the initial status of a new comment.
pub trait ModerationPolicy: Send + Sync {
    fn initial_status(&self, author_id: i64, target: TargetRef) -> CommentStatus;
}

/// Receives events after the owning transaction committed.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: CommentEvent);
}

/// Directory backed by the `comment_targets` table.
#[derive(Clone)]
pub struct SqlTargetDirectory {
    pool: SqlitePool,
}

impl SqlTargetDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a target, keeping the existing row if already known.
    pub async fn register(&self, target: TargetRef, owner_id: i64) -> Result<(), CommentError> {
        sqlx::query(
            r#"
            INSERT INTO comment_targets (id, target_type, owner_id)
            VALUES (?, ?, ?)
            ON CONFLICT (target_type, id) DO NOTHING
            "#,
        )
        .bind(target.target_id)
        .bind(target.target_type)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn comment_count(&self, target: TargetRef) -> Result<Option<i64>, CommentError> {
        let count = sqlx::query_scalar(
            "SELECT comments_count FROM comment_targets WHERE target_type = ? AND id = ?",
        )
        .bind(target.target_type)
        .bind(target.target_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl TargetDirectory for SqlTargetDirectory {
    async fn owner_of(&self, target: TargetRef) -> Result<Option<i64>, CommentError> {
        let owner = sqlx::query_scalar(
            "SELECT owner_id FROM comment_targets WHERE target_type = ? AND id = ?",
        )
        .bind(target.target_type)
        .bind(target.target_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn adjust_comment_count(
        &self,
        target: TargetRef,
        delta: i64,
    ) -> Result<(), CommentError> {
        sqlx::query(
            r#"
            UPDATE comment_targets
            SET comments_count = MAX(0, comments_count + ?)
            WHERE target_type = ? AND id = ?
            "#,
        )
        .bind(delta)
        .bind(target.target_type)
        .bind(target.target_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Lets the comment author or the owner of the commented content delete.
pub struct AuthorOrTargetOwner {
    targets: Arc<dyn TargetDirectory>,
}

impl AuthorOrTargetOwner {
    pub fn new(targets: Arc<dyn TargetDirectory>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl DeleteAuthorizer for AuthorOrTargetOwner {
    async fn can_delete(&self, actor_id: i64, comment: &Comment) -> Result<bool, CommentError> {
        if comment.author_id == actor_id {
            return Ok(true);
        }
        let owner = self.targets.owner_of(comment.target()).await?;
        Ok(owner == Some(actor_id))
    }
}

/// Auto-publish or mandatory pre-moderation, fixed by configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredPolicy {
    pub auto_publish: bool,
}

impl ModerationPolicy for ConfiguredPolicy {
    fn initial_status(&self, _author_id: i64, _target: TargetRef) -> CommentStatus {
        ModerationGate::initial_status(self.auto_publish)
    }
}

/// Forwards events to a channel consumed by the notification side.
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<CommentEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CommentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: CommentEvent) {
        if self.sender.send(event).is_err() {
            tracing::warn!("Comment event dropped: receiver closed");
        }
    }
}
