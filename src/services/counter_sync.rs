use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::CommentError, models::comment::CounterSnapshot, services::database::begin_write,
    utils::time,
};

/// Weight of one like in `hot_score`.
pub const LIKE_WEIGHT: i64 = 1;
/// Weight of one direct reply in `hot_score`.
pub const REPLY_WEIGHT: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Likes,
    Replies,
}

pub struct CounterSync;

impl CounterSync {
    /// Adds `delta` to one counter in a single statement, clamping at zero and
    /// refreshing `hot_score` from the new values.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        comment_id: i64,
        field: CounterField,
        delta: i64,
    ) -> Result<(), CommentError> {
        let (likes, replies) = match field {
            CounterField::Likes => ("MAX(0, like_count + ?1)", "reply_count"),
            CounterField::Replies => ("like_count", "MAX(0, reply_count + ?1)"),
        };
        let sql = format!(
            "UPDATE comments SET like_count = {likes}, reply_count = {replies}, \
             hot_score = {likes} * {LIKE_WEIGHT} + {replies} * {REPLY_WEIGHT}, \
             updated_at = ?2 WHERE id = ?3"
        );

        sqlx::query(&sql)
            .bind(delta)
            .bind(time::to_sql(&time::now()))
            .bind(comment_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn increment(
        conn: &mut SqliteConnection,
        comment_id: i64,
        field: CounterField,
    ) -> Result<(), CommentError> {
        Self::adjust(conn, comment_id, field, 1).await
    }

    pub async fn decrement(
        conn: &mut SqliteConnection,
        comment_id: i64,
        field: CounterField,
    ) -> Result<(), CommentError> {
        Self::adjust(conn, comment_id, field, -1).await
    }

    /// Recomputes the counters of one comment from the source rows and overwrites
    /// the stored values. Calling it again without intervening writes changes nothing.
    pub async fn resync(
        conn: &mut SqliteConnection,
        comment_id: i64,
    ) -> Result<CounterSnapshot, CommentError> {
        let before = sqlx::query_as::<_, CounterSnapshot>(
            "SELECT like_count, reply_count, hot_score FROM comments WHERE id = ?",
        )
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CommentError::NotFound)?;

        let reply_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE parent_id = ? AND status = 'published'",
        )
        .bind(comment_id)
        .fetch_one(&mut *conn)
        .await?;

        let like_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?")
                .bind(comment_id)
                .fetch_one(&mut *conn)
                .await?;

        let after = CounterSnapshot {
            like_count,
            reply_count,
            hot_score: like_count * LIKE_WEIGHT + reply_count * REPLY_WEIGHT,
        };

        if after != before {
            tracing::warn!(
                comment_id,
                ?before,
                ?after,
                "Counter drift repaired"
            );
            sqlx::query(
                r#"
                UPDATE comments
                SET like_count = ?, reply_count = ?, hot_score = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(after.like_count)
            .bind(after.reply_count)
            .bind(after.hot_score)
            .bind(time::to_sql(&time::now()))
            .bind(comment_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(after)
    }

    /// Resyncs every comment in id order, `batch_size` comments per transaction.
    /// Returns the number of comments visited.
    pub async fn resync_all(pool: &SqlitePool, batch_size: i64) -> Result<u64, CommentError> {
        let mut last_id = 0_i64;
        let mut visited = 0_u64;

        loop {
            let ids: Vec<i64> =
                sqlx::query_scalar("SELECT id FROM comments WHERE id > ? ORDER BY id LIMIT ?")
                    .bind(last_id)
                    .bind(batch_size.max(1))
                    .fetch_all(pool)
                    .await?;

            let Some(&max_id) = ids.last() else {
                break;
            };

            let mut tx = begin_write(pool).await?;
            for id in &ids {
                Self::resync(&mut *tx, *id).await?;
            }
            tx.commit().await?;

            visited += ids.len() as u64;
            last_id = max_id;
        }

        tracing::debug!(visited, "Counter sweep finished");
        Ok(visited)
    }
}
