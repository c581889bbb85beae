//! Opaque pagination cursors.
//!
//! Both cursors are URL-safe base64 over a small `kind:a:b` text form.
//! Decoding never falls back to the first page: anything that does not
//! round-trip is rejected with [`CommentError::InvalidCursor`].

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};

use crate::error::CommentError;

const THREAD_TAG: &str = "t";
const REPLY_TAG: &str = "r";

/// Position after the last top-level comment of a thread page.
/// Pages are ordered by `(created_at desc, id desc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadCursor {
    pub created_at: DateTime<Utc>,
    pub id: i64,
}

impl ThreadCursor {
    pub fn encode(&self) -> String {
        encode_parts(THREAD_TAG, self.created_at.timestamp_micros(), self.id)
    }

    pub fn decode(raw: &str) -> Result<Self, CommentError> {
        let (micros, id) = decode_parts(THREAD_TAG, raw)?;
        let created_at =
            DateTime::<Utc>::from_timestamp_micros(micros).ok_or(CommentError::InvalidCursor)?;
        Ok(Self { created_at, id })
    }
}

/// Position after the last reply seen under one parent.
/// Reply pages are ordered by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyCursor {
    pub parent_id: i64,
    pub after_id: i64,
}

impl ReplyCursor {
    pub fn encode(&self) -> String {
        encode_parts(REPLY_TAG, self.parent_id, self.after_id)
    }

    /// Decodes a cursor and checks it was issued for `parent_id`.
    pub fn decode_for(raw: &str, parent_id: i64) -> Result<Self, CommentError> {
        let (cursor_parent, after_id) = decode_parts(REPLY_TAG, raw)?;
        if cursor_parent != parent_id {
            return Err(CommentError::InvalidCursor);
        }
        Ok(Self {
            parent_id,
            after_id,
        })
    }
}

fn encode_parts(tag: &str, a: i64, b: i64) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}:{}:{}", tag, a, b))
}

fn decode_parts(tag: &str, raw: &str) -> Result<(i64, i64), CommentError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw.trim())
        .map_err(|_| CommentError::InvalidCursor)?;
    let text = String::from_utf8(bytes).map_err(|_| CommentError::InvalidCursor)?;

    let mut parts = text.split(':');
    let (Some(found_tag), Some(a), Some(b), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CommentError::InvalidCursor);
    };
    if found_tag != tag {
        return Err(CommentError::InvalidCursor);
    }

    let a = a.parse::<i64>().map_err(|_| CommentError::InvalidCursor)?;
    let b = b.parse::<i64>().map_err(|_| CommentError::InvalidCursor)?;
    if b < 0 {
        return Err(CommentError::InvalidCursor);
    }
    Ok((a, b))
}
