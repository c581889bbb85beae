use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::CommentError,
    models::{
        comment::{Comment, Page, PageParams, TargetRef, ThreadItem},
        relation::CommentRelation,
    },
    services::{comment_store::fetch_comment, relation_index::RelationIndex},
    utils::{
        cursor::{ReplyCursor, ThreadCursor},
        time,
    },
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Read side: thread pages with inlined replies, reply pages and subtree queries.
/// Only published comments are ever listed.
#[derive(Clone)]
pub struct TreeAssembler {
    pool: SqlitePool,
    inline_replies: usize,
}

impl TreeAssembler {
    pub fn new(pool: SqlitePool, inline_replies: usize) -> Self {
        Self {
            pool,
            inline_replies,
        }
    }

    /// A page of top-level comments, newest first, each with its oldest replies.
    pub async fn fetch_thread(
        &self,
        target: TargetRef,
        params: &PageParams,
    ) -> Result<Page<ThreadItem>, CommentError> {
        let limit = page_limit(params.limit);
        let cursor = params
            .cursor
            .as_deref()
            .map(ThreadCursor::decode)
            .transpose()?;
        let cursor_at = cursor.map(|c| time::to_sql(&c.created_at));
        let cursor_id = cursor.map(|c| c.id);

        // 1. Top-level page, strictly after the cursor
        let roots = sqlx::query_as::<_, Comment>(
            r#"
            SELECT *
            FROM comments
            WHERE target_type = ?
              AND target_id = ?
              AND parent_id IS NULL
              AND status = 'published'
              AND (? IS NULL OR created_at < ? OR (created_at = ? AND id < ?))
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(target.target_type)
        .bind(target.target_id)
        .bind(&cursor_at)
        .bind(&cursor_at)
        .bind(&cursor_at)
        .bind(cursor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // 2. Direct replies of the whole page in one round-trip
        let root_ids: Vec<i64> = roots.iter().map(|c| c.id).collect();
        let mut replies = self.first_replies(&root_ids).await?;

        // 3. Attach, cutting each group at the inline threshold
        let next_cursor = if (roots.len() as i64) < limit {
            None
        } else {
            roots.last().map(|last| {
                ThreadCursor {
                    created_at: last.created_at,
                    id: last.id,
                }
                .encode()
            })
        };

        let items = roots
            .into_iter()
            .map(|comment| {
                let mut group = replies.remove(&comment.id).unwrap_or_default();
                let replies_cursor = if group.len() > self.inline_replies {
                    group.truncate(self.inline_replies);
                    Some(
                        ReplyCursor {
                            parent_id: comment.id,
                            after_id: group.last().map(|c| c.id).unwrap_or(0),
                        }
                        .encode(),
                    )
                } else {
                    None
                };
                ThreadItem {
                    comment,
                    replies: group,
                    replies_cursor,
                }
            })
            .collect();

        tracing::debug!(thread = ?target, has_more = next_cursor.is_some(), "Thread page assembled");

        Ok(Page { items, next_cursor })
    }

    /// Published direct children of `parent_id`, by ascending id.
    pub async fn fetch_replies(
        &self,
        parent_id: i64,
        params: &PageParams,
    ) -> Result<Page<Comment>, CommentError> {
        let limit = page_limit(params.limit);
        let after_id = match params.cursor.as_deref() {
            Some(raw) => ReplyCursor::decode_for(raw, parent_id)?.after_id,
            None => 0,
        };

        // A deleted parent keeps its replies reachable, a blocked thread does not
        if fetch_comment(&self.pool, parent_id).await?.is_none()
            || RelationIndex::in_blocked_thread(&self.pool, parent_id).await?
        {
            return Err(CommentError::NotFound);
        }

        let items = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.*
            FROM comment_relations r
            JOIN comments c ON c.id = r.descendant_id
            WHERE r.ancestor_id = ?
              AND r.depth = 1
              AND c.status = 'published'
              AND c.id > ?
            ORDER BY c.id ASC
            LIMIT ?
            "#,
        )
        .bind(parent_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let next_cursor = if (items.len() as i64) < limit {
            None
        } else {
            items.last().map(|last| {
                ReplyCursor {
                    parent_id,
                    after_id: last.id,
                }
                .encode()
            })
        };

        Ok(Page { items, next_cursor })
    }

    /// Ancestor chain of a comment, root first.
    pub async fn ancestors(&self, id: i64) -> Result<Vec<CommentRelation>, CommentError> {
        let rows = RelationIndex::ancestors_of(&self.pool, id).await?;
        if rows.is_empty() {
            return Err(CommentError::NotFound);
        }
        Ok(rows)
    }

    /// Subtree of a comment in depth-first order.
    pub async fn descendants(
        &self,
        id: i64,
        max_depth: Option<i64>,
    ) -> Result<Vec<CommentRelation>, CommentError> {
        if fetch_comment(&self.pool, id).await?.is_none() {
            return Err(CommentError::NotFound);
        }
        RelationIndex::descendants_of(&self.pool, id, max_depth).await
    }

    /// Up to `inline_replies + 1` published children per parent, grouped by parent id.
    ///
    /// Ordered by id, the key the reply cursor continues from. `created_at` is
    /// stamped under the write lock, so this is also creation order.
    /// The extra row tells whether more replies exist.
    async fn first_replies(
        &self,
        parent_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Comment>>, CommentError> {
        let mut grouped: HashMap<i64, Vec<Comment>> = HashMap::new();
        if parent_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT * FROM (
                SELECT c.*,
                       ROW_NUMBER() OVER (
                           PARTITION BY r.ancestor_id
                           ORDER BY c.id ASC
                       ) AS reply_rank
                FROM comment_relations r
                JOIN comments c ON c.id = r.descendant_id
                WHERE r.depth = 1
                  AND c.status = 'published'
                  AND r.ancestor_id IN (
            "#,
        );
        let mut ids = builder.separated(", ");
        for id in parent_ids {
            ids.push_bind(*id);
        }
        builder.push(")) WHERE reply_rank <= ");
        builder.push_bind(self.inline_replies as i64 + 1);
        builder.push(" ORDER BY parent_id, id ASC");

        let rows = builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await?;

        for reply in rows {
            if let Some(parent_id) = reply.parent_id {
                grouped.entry(parent_id).or_default().push(reply);
            }
        }
        Ok(grouped)
    }
}

/// Default 20, clamped to 1..=100.
pub fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}
