use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use url::Url;
use validator::Validate;

/// Kind of content a comment can be attached to.
/// Stored as lowercase text in `comments.target_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Article,
    Topic,
    Thread,
}

/// Polymorphic reference to the commented-on content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub target_type: TargetType,
    pub target_id: i64,
}

impl TargetRef {
    pub fn new(target_type: TargetType, target_id: i64) -> Self {
        Self {
            target_type,
            target_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Text,
    Image,
    Video,
}

/// Moderation status of a comment. Only `Published` comments are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CommentStatus {
    Pending,
    Published,
    Deleted,
    Blocked,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Published => "published",
            CommentStatus::Deleted => "deleted",
            CommentStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the 'comments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub target_id: i64,
    pub target_type: TargetType,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub body: Option<String>,
    pub body_kind: BodyKind,

    /// Stored as a JSON array in the database.
    pub media_urls: Json<Vec<String>>,

    // Denormalized counters, only written by CounterSync.
    pub like_count: i64,
    pub reply_count: i64,
    pub hot_score: i64,

    pub status: CommentStatus,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub moderated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Comment {
    pub fn target(&self) -> TargetRef {
        TargetRef::new(self.target_type, self.target_id)
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub target_type: TargetType,
    pub target_id: i64,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,

    #[validate(length(max = 5000, message = "Comment must be at most 5000 characters"))]
    pub body: Option<String>,

    #[serde(default)]
    pub body_kind: BodyKind,

    #[serde(default)]
    #[validate(custom(function = validate_media_urls))]
    pub media_urls: Vec<String>,
}

impl CreateCommentRequest {
    /// Body with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_body(&self) -> Option<&str> {
        self.body
            .as_deref()
            .map(str::trim)
            .filter(|body| !body.is_empty())
    }
}

/// Validates each media URL for length and format.
fn validate_media_urls(urls: &[String]) -> Result<(), validator::ValidationError> {
    for url in urls {
        if url.len() > 500 {
            return Err(validator::ValidationError::new("url_too_long"));
        }
        if Url::parse(url).is_err() {
            return Err(validator::ValidationError::new("invalid_url"));
        }
    }
    Ok(())
}

/// A top-level comment with its first direct replies attached.
#[derive(Debug, Serialize)]
pub struct ThreadItem {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,

    /// Continuation for `FetchReplies` when the comment has more replies
    /// than were inlined.
    pub replies_cursor: Option<String>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Query parameters for thread and reply listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    /// Opaque cursor returned by the previous page.
    pub cursor: Option<String>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

/// Result of a like/unlike operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: i64,
}

/// An external review decision.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationDecision {
    pub decision: CommentStatus,
    pub reason: Option<String>,
    pub reviewer_id: Option<i64>,
}

/// Counter values after a resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct CounterSnapshot {
    pub like_count: i64,
    pub reply_count: i64,
    pub hot_score: i64,
}
