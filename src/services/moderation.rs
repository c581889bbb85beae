use sqlx::SqliteConnection;

use crate::{
    error::CommentError,
    models::comment::{Comment, CommentStatus},
    utils::time,
};

/// Lifecycle of a comment's visibility.
///
/// ```text
/// Pending ──► Published ──► Deleted
///    │            │
///    ├──────► Blocked ◄─┘
///    └──────► Deleted
/// ```
/// `Deleted` and `Blocked` are terminal.
pub struct ModerationGate;

impl ModerationGate {
    /// The only status that appears in listings.
    pub const LISTABLE: CommentStatus = CommentStatus::Published;

    pub fn can_transition(from: CommentStatus, to: CommentStatus) -> bool {
        use CommentStatus::*;
        matches!(
            (from, to),
            (Pending, Published) | (Pending, Blocked) | (Pending, Deleted)
                | (Published, Deleted) | (Published, Blocked)
        )
    }

    pub fn check(from: CommentStatus, to: CommentStatus) -> Result<(), CommentError> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(CommentError::InvalidTransition { from, to })
        }
    }

    /// Initial status for a new comment.
    pub fn initial_status(auto_publish: bool) -> CommentStatus {
        if auto_publish {
            CommentStatus::Published
        } else {
            CommentStatus::Pending
        }
    }

    /// Moves `comment` to `to`, guarded on the status it was read with.
    ///
    /// Returns `false` when another writer changed the status first; the caller
    /// decides how to report that. Timestamps follow the target state: `Published`
    /// stamps `published_at`, `Deleted` stamps `deleted_at`, review decisions stamp
    /// `moderated_at`.
    pub async fn transition(
        conn: &mut SqliteConnection,
        comment: &Comment,
        to: CommentStatus,
        reviewed: bool,
    ) -> Result<bool, CommentError> {
        Self::check(comment.status, to)?;

        let now = time::to_sql(&time::now());
        let published_at = (to == CommentStatus::Published).then(|| now.clone());
        let deleted_at = (to == CommentStatus::Deleted).then(|| now.clone());
        let moderated_at = reviewed.then(|| now.clone());

        let result = sqlx::query(
            r#"
            UPDATE comments
            SET status = ?,
                published_at = COALESCE(?, published_at),
                deleted_at = COALESCE(?, deleted_at),
                moderated_at = COALESCE(?, moderated_at),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to)
        .bind(published_at)
        .bind(deleted_at)
        .bind(moderated_at)
        .bind(&now)
        .bind(comment.id)
        .bind(comment.status)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CommentStatus::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for to in [Pending, Published, Deleted, Blocked] {
            assert!(!ModerationGate::can_transition(Deleted, to));
            assert!(!ModerationGate::can_transition(Blocked, to));
        }
    }

    #[test]
    fn review_decisions_follow_the_machine() {
        assert!(ModerationGate::can_transition(Pending, Published));
        assert!(ModerationGate::can_transition(Pending, Blocked));
        assert!(ModerationGate::can_transition(Published, Blocked));
        assert!(!ModerationGate::can_transition(Published, Pending));
        assert!(matches!(
            ModerationGate::check(Deleted, Published),
            Err(CommentError::InvalidTransition {
                from: Deleted,
                to: Published
            })
        ));
    }

    #[test]
    fn initial_status_follows_policy() {
        assert_eq!(ModerationGate::initial_status(true), Published);
        assert_eq!(ModerationGate::initial_status(false), Pending);
    }
}
