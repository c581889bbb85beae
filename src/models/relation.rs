use serde::Serialize;
use sqlx::FromRow;

/// One row of the closure table: `ancestor_id` reaches `descendant_id`
/// in `depth` steps. Every comment has a self row at depth 0.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CommentRelation {
    pub ancestor_id: i64,
    pub descendant_id: i64,
    pub depth: i64,

    /// Zero-padded ids from ancestor to descendant, comma separated.
    pub path: String,
}

/// Query parameters for subtree listings.
#[derive(Debug, Default, serde::Deserialize)]
pub struct DescendantParams {
    pub max_depth: Option<i64>,
}
