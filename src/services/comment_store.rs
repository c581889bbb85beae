use std::sync::Arc;

use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool, types::Json};
use validator::Validate;

use crate::{
    config::CommentSettings,
    error::CommentError,
    models::{
        comment::{
            Comment, CommentStatus, CounterSnapshot, CreateCommentRequest, LikeOutcome,
            ModerationDecision, TargetRef,
        },
        event::CommentEvent,
    },
    services::{
        collaborators::{DeleteAuthorizer, EventSink, ModerationPolicy, TargetDirectory},
        counter_sync::{CounterField, CounterSync},
        database::begin_write,
        moderation::ModerationGate,
        relation_index::RelationIndex,
    },
    utils::{html::clean_html, time},
};

/// Writes to individual comments: creation, deletion, likes and moderation.
/// Every mutation runs in one transaction together with its relation rows
/// and counter updates.
#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
    targets: Arc<dyn TargetDirectory>,
    authorizer: Arc<dyn DeleteAuthorizer>,
    policy: Arc<dyn ModerationPolicy>,
    events: Arc<dyn EventSink>,
    settings: CommentSettings,
}

impl CommentStore {
    pub fn new(
        pool: SqlitePool,
        targets: Arc<dyn TargetDirectory>,
        authorizer: Arc<dyn DeleteAuthorizer>,
        policy: Arc<dyn ModerationPolicy>,
        events: Arc<dyn EventSink>,
        settings: CommentSettings,
    ) -> Self {
        Self {
            pool,
            targets,
            authorizer,
            policy,
            events,
            settings,
        }
    }

    pub async fn get(&self, id: i64) -> Result<Comment, CommentError> {
        fetch_comment(&self.pool, id)
            .await?
            .ok_or(CommentError::NotFound)
    }

    /// Create a new comment or reply.
    pub async fn create(
        &self,
        author_id: i64,
        request: CreateCommentRequest,
    ) -> Result<Comment, CommentError> {
        // 1. Validation, before anything touches the database
        request.validate()?;
        if request.media_urls.len() > self.settings.max_media {
            return Err(CommentError::TooManyMedia {
                max: self.settings.max_media,
            });
        }
        // Emptiness is judged on what would be stored, after sanitizing
        let body = sanitized_body(&request);
        if body.is_none() && request.media_urls.is_empty() {
            return Err(CommentError::EmptyContent);
        }

        // 2. Target existence is owned by the content modules
        let target = TargetRef::new(request.target_type, request.target_id);
        if self.targets.owner_of(target).await?.is_none() {
            return Err(CommentError::TargetNotFound);
        }

        let status = self.policy.initial_status(author_id, target);
        let mut tx = begin_write(&self.pool).await?;

        // 3. Parent must be a live comment on the same target, outside blocked threads
        if let Some(parent_id) = request.parent_id {
            let parent = fetch_comment(&mut *tx, parent_id)
                .await?
                .filter(|parent| parent.target() == target)
                .filter(|parent| parent.status != CommentStatus::Deleted)
                .ok_or(CommentError::ParentNotFound)?;

            if RelationIndex::in_blocked_thread(&mut *tx, parent.id).await? {
                return Err(CommentError::InvalidParent);
            }

            if let Some(max) = self.settings.max_depth {
                let parent_depth = RelationIndex::depth_of(&mut *tx, parent.id)
                    .await?
                    .unwrap_or(0);
                if parent_depth + 1 > i64::from(max) {
                    return Err(CommentError::MaxDepthExceeded { max });
                }
            }
        }

        // 4. Comment row, then its closure rows. Stamped under the write lock,
        //    so `created_at` never runs backwards against id order.
        let now = time::to_sql(&time::now());
        let published_at = (status == CommentStatus::Published).then(|| now.clone());
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO comments (
                target_id, target_type, author_id, parent_id,
                body, body_kind, media_urls, status,
                published_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(target.target_id)
        .bind(target.target_type)
        .bind(author_id)
        .bind(request.parent_id)
        .bind(&body)
        .bind(request.body_kind)
        .bind(Json(&request.media_urls))
        .bind(status)
        .bind(published_at)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create comment: {:?}", e);
            CommentError::from(e)
        })?;

        let depth = RelationIndex::insert(&mut tx, id, request.parent_id).await?;

        // 5. Only published comments count towards their parent
        let comment = fetch_comment(&mut *tx, id)
            .await?
            .ok_or(CommentError::NotFound)?;
        if status == CommentStatus::Published {
            count_in_parent(&mut tx, &comment, 1).await?;
        }

        tx.commit().await?;

        tracing::info!(
            comment_id = id,
            parent_id = ?request.parent_id,
            depth,
            status = %status,
            "Comment created"
        );

        if status == CommentStatus::Published {
            self.count_in_target(&comment, 1).await;
        }
        self.events.publish(CommentEvent::Created {
            id,
            parent_id: comment.parent_id,
            author_id,
            target,
        });

        Ok(comment)
    }

    /// Soft delete. Replies stay in place under the tombstone.
    pub async fn delete(&self, id: i64, actor_id: i64) -> Result<(), CommentError> {
        let comment = self.get(id).await?;
        if comment.status == CommentStatus::Deleted {
            return Err(CommentError::AlreadyDeleted);
        }

        if !self.authorizer.can_delete(actor_id, &comment).await? {
            return Err(CommentError::Unauthorized);
        }

        let mut tx = begin_write(&self.pool).await?;

        if !ModerationGate::transition(&mut tx, &comment, CommentStatus::Deleted, false).await? {
            // Lost a race: report what the other writer left behind
            let current = fetch_comment(&mut *tx, id)
                .await?
                .ok_or(CommentError::NotFound)?;
            return Err(match current.status {
                CommentStatus::Deleted => CommentError::AlreadyDeleted,
                from => CommentError::InvalidTransition {
                    from,
                    to: CommentStatus::Deleted,
                },
            });
        }

        let was_counted = comment.status == CommentStatus::Published;
        if was_counted {
            count_in_parent(&mut tx, &comment, -1).await?;
        }

        tx.commit().await?;

        tracing::info!(comment_id = id, actor_id, "Comment deleted");

        if was_counted {
            self.count_in_target(&comment, -1).await;
        }
        self.events.publish(CommentEvent::Deleted { id, actor_id });

        Ok(())
    }

    /// Like if not liked yet, otherwise unlike.
    pub async fn toggle_like(&self, id: i64, user_id: i64) -> Result<LikeOutcome, CommentError> {
        let mut tx = begin_write(&self.pool).await?;

        let comment = fetch_comment(&mut *tx, id)
            .await?
            .ok_or(CommentError::NotFound)?;

        // 1. Check if already liked
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM comment_likes WHERE user_id = ? AND comment_id = ?",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        // 2. Unlike, or like; a concurrent like of the same pair counts as liked
        let (liked, newly_liked) = if existing.is_some() {
            remove_like(&mut tx, id, user_id).await?;
            (false, false)
        } else {
            if comment.status != ModerationGate::LISTABLE {
                return Err(CommentError::NotFound);
            }
            (true, add_like(&mut tx, id, user_id).await?)
        };

        let like_count = current_like_count(&mut *tx, id).await?;
        tx.commit().await?;

        if newly_liked {
            self.events.publish(CommentEvent::Liked {
                id,
                user_id,
                author_id: comment.author_id,
            });
        }

        Ok(LikeOutcome { liked, like_count })
    }

    /// Idempotent like: liking twice leaves a single ledger row.
    pub async fn like(&self, id: i64, user_id: i64) -> Result<LikeOutcome, CommentError> {
        let mut tx = begin_write(&self.pool).await?;

        let comment = fetch_comment(&mut *tx, id)
            .await?
            .filter(|comment| comment.status == ModerationGate::LISTABLE)
            .ok_or(CommentError::NotFound)?;

        let inserted = add_like(&mut tx, id, user_id).await?;
        let like_count = current_like_count(&mut *tx, id).await?;
        tx.commit().await?;

        if inserted {
            self.events.publish(CommentEvent::Liked {
                id,
                user_id,
                author_id: comment.author_id,
            });
        }

        Ok(LikeOutcome {
            liked: true,
            like_count,
        })
    }

    /// Idempotent unlike: unliking a comment that was not liked is not an error.
    pub async fn unlike(&self, id: i64, user_id: i64) -> Result<LikeOutcome, CommentError> {
        let mut tx = begin_write(&self.pool).await?;

        if fetch_comment(&mut *tx, id).await?.is_none() {
            return Err(CommentError::NotFound);
        }

        remove_like(&mut tx, id, user_id).await?;
        let like_count = current_like_count(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(LikeOutcome {
            liked: false,
            like_count,
        })
    }

    /// Applies an external review decision (`published` or `blocked`).
    /// Re-applying the current status is a no-op.
    pub async fn apply_moderation_decision(
        &self,
        id: i64,
        decision: ModerationDecision,
    ) -> Result<Comment, CommentError> {
        let to = decision.decision;
        if !matches!(to, CommentStatus::Published | CommentStatus::Blocked) {
            return Err(CommentError::Validation(format!(
                "decision must be 'published' or 'blocked', got '{}'",
                to
            )));
        }

        let comment = self.get(id).await?;
        if comment.status == to {
            return Ok(comment);
        }
        ModerationGate::check(comment.status, to)?;

        let mut tx = begin_write(&self.pool).await?;

        if !ModerationGate::transition(&mut tx, &comment, to, true).await? {
            let current = fetch_comment(&mut *tx, id)
                .await?
                .ok_or(CommentError::NotFound)?;
            return Err(CommentError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        // Relation rows are never touched; only visibility and counters move
        let delta = visibility_delta(comment.status, to);
        if delta != 0 {
            count_in_parent(&mut tx, &comment, delta).await?;
        }

        let updated = fetch_comment(&mut *tx, id)
            .await?
            .ok_or(CommentError::NotFound)?;
        tx.commit().await?;

        tracing::info!(
            comment_id = id,
            from = %comment.status,
            to = %to,
            reviewer_id = ?decision.reviewer_id,
            "Moderation decision applied"
        );

        if delta != 0 {
            self.count_in_target(&comment, delta).await;
        }
        self.events.publish(CommentEvent::Moderated {
            id,
            from: comment.status,
            to,
            reason: decision.reason,
            reviewer_id: decision.reviewer_id,
        });

        Ok(updated)
    }

    /// Recomputes the counters of one comment. See [`CounterSync::resync`].
    pub async fn resync(&self, id: i64) -> Result<CounterSnapshot, CommentError> {
        let mut tx = begin_write(&self.pool).await?;
        let snapshot = CounterSync::resync(&mut tx, id).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Post-commit callback; failures are logged and left to a later repair.
    async fn count_in_target(&self, comment: &Comment, delta: i64) {
        if !comment.is_top_level() {
            return;
        }
        if let Err(e) = self
            .targets
            .adjust_comment_count(comment.target(), delta)
            .await
        {
            tracing::warn!(
                comment_id = comment.id,
                "Failed to adjust target comment count: {}",
                e
            );
        }
    }
}

/// Sanitized, trimmed body; `None` when nothing but markup or whitespace remains.
fn sanitized_body(request: &CreateCommentRequest) -> Option<String> {
    let cleaned = clean_html(request.trimmed_body()?);
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

pub(crate) async fn fetch_comment<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
) -> Result<Option<Comment>, CommentError> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(comment)
}

/// +1 when a comment becomes listed, -1 when it stops being listed.
fn visibility_delta(from: CommentStatus, to: CommentStatus) -> i64 {
    match (from == ModerationGate::LISTABLE, to == ModerationGate::LISTABLE) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// Only the immediate parent counts a reply.
async fn count_in_parent(
    conn: &mut SqliteConnection,
    comment: &Comment,
    delta: i64,
) -> Result<(), CommentError> {
    if let Some(parent_id) = comment.parent_id {
        CounterSync::adjust(conn, parent_id, CounterField::Replies, delta).await?;
    }
    Ok(())
}

/// Inserts a ledger row. A uniqueness violation means a concurrent writer
/// already liked; returns whether this call created the row.
async fn add_like(
    conn: &mut SqliteConnection,
    comment_id: i64,
    user_id: i64,
) -> Result<bool, CommentError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO comment_likes (user_id, comment_id, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(comment_id)
    .bind(time::to_sql(&time::now()))
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => {
            CounterSync::increment(conn, comment_id, CounterField::Likes).await?;
            Ok(true)
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Returns whether a ledger row was removed.
async fn remove_like(
    conn: &mut SqliteConnection,
    comment_id: i64,
    user_id: i64,
) -> Result<bool, CommentError> {
    let removed = sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
        .bind(user_id)
        .bind(comment_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if removed == 1 {
        CounterSync::decrement(conn, comment_id, CounterField::Likes).await?;
    }
    Ok(removed == 1)
}

async fn current_like_count<'e>(
    executor: impl SqliteExecutor<'e>,
    id: i64,
) -> Result<i64, CommentError> {
    let count = sqlx::query_scalar("SELECT like_count FROM comments WHERE id = ?")
        .bind(id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}
