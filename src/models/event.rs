use serde::Serialize;

use super::comment::{CommentStatus, TargetRef};

/// Outbound notifications, published after the owning transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommentEvent {
    Created {
        id: i64,
        parent_id: Option<i64>,
        author_id: i64,
        target: TargetRef,
    },
    Liked {
        id: i64,
        user_id: i64,
        author_id: i64,
    },
    Deleted {
        id: i64,
        actor_id: i64,
    },
    Moderated {
        id: i64,
        from: CommentStatus,
        to: CommentStatus,
        reason: Option<String>,
        reviewer_id: Option<i64>,
    },
}
