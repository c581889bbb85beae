//! Closure table over the reply tree.
//!
//! For every comment the table holds one row per ancestor (itself included at
//! depth 0). Rows are written once, inside the transaction that creates the
//! comment, and never updated afterwards.

use sqlx::{SqliteConnection, SqliteExecutor};

use crate::{error::CommentError, models::relation::CommentRelation};

/// Width of one id segment in `path`. Fixed width keeps text order equal to id order.
const PATH_SEGMENT_WIDTH: usize = 12;

pub struct RelationIndex;

impl RelationIndex {
    /// Writes every ancestor pair of a freshly inserted comment and returns its depth.
    ///
    /// Reads only the parent's existing chain, so the cost is proportional to the
    /// depth of the new comment and concurrent inserts under one parent never touch
    /// the same rows.
    pub async fn insert(
        conn: &mut SqliteConnection,
        comment_id: i64,
        parent_id: Option<i64>,
    ) -> Result<i64, CommentError> {
        let mut depth = 0;

        if let Some(parent_id) = parent_id {
            let chain = Self::ancestors_of(&mut *conn, parent_id).await?;
            if chain.is_empty() {
                return Err(CommentError::ParentNotFound);
            }

            for row in &chain {
                let row_depth = row.depth + 1;
                sqlx::query(
                    r#"
                    INSERT INTO comment_relations (ancestor_id, descendant_id, depth, path)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(row.ancestor_id)
                .bind(comment_id)
                .bind(row_depth)
                .bind(format!("{},{}", row.path, path_segment(comment_id)))
                .execute(&mut *conn)
                .await?;
                depth = depth.max(row_depth);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO comment_relations (ancestor_id, descendant_id, depth, path)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(comment_id)
        .bind(comment_id)
        .bind(path_segment(comment_id))
        .execute(&mut *conn)
        .await?;

        Ok(depth)
    }

    /// Subtree rows below `comment_id` in depth-first reply order.
    pub async fn descendants_of<'e>(
        executor: impl SqliteExecutor<'e>,
        comment_id: i64,
        max_depth: Option<i64>,
    ) -> Result<Vec<CommentRelation>, CommentError> {
        let rows = sqlx::query_as::<_, CommentRelation>(
            r#"
            SELECT ancestor_id, descendant_id, depth, path
            FROM comment_relations
            WHERE ancestor_id = ?
              AND depth > 0
              AND (? IS NULL OR depth <= ?)
            ORDER BY path
            "#,
        )
        .bind(comment_id)
        .bind(max_depth)
        .bind(max_depth)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Ancestor chain of `comment_id`, root first, ending with its own self row.
    /// Empty when the comment does not exist.
    pub async fn ancestors_of<'e>(
        executor: impl SqliteExecutor<'e>,
        comment_id: i64,
    ) -> Result<Vec<CommentRelation>, CommentError> {
        let rows = sqlx::query_as::<_, CommentRelation>(
            r#"
            SELECT ancestor_id, descendant_id, depth, path
            FROM comment_relations
            WHERE descendant_id = ?
            ORDER BY depth DESC
            "#,
        )
        .bind(comment_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Distance from the root of the comment's thread; `None` if unknown.
    pub async fn depth_of<'e>(
        executor: impl SqliteExecutor<'e>,
        comment_id: i64,
    ) -> Result<Option<i64>, CommentError> {
        let depth: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(depth) FROM comment_relations WHERE descendant_id = ?",
        )
        .bind(comment_id)
        .fetch_one(executor)
        .await?;

        Ok(depth)
    }

    /// True when the comment or any of its ancestors is blocked.
    pub async fn in_blocked_thread<'e>(
        executor: impl SqliteExecutor<'e>,
        comment_id: i64,
    ) -> Result<bool, CommentError> {
        let blocked: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM comment_relations r
            JOIN comments c ON c.id = r.ancestor_id
            WHERE r.descendant_id = ? AND c.status = 'blocked'
            "#,
        )
        .bind(comment_id)
        .fetch_one(executor)
        .await?;

        Ok(blocked > 0)
    }
}

fn path_segment(id: i64) -> String {
    format!("{:0width$}", id, width = PATH_SEGMENT_WIDTH)
}
