// src/config.rs

use std::env;
use std::str::FromStr;
use dotenvy::dotenv;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub comments: CommentSettings,
}

/// Tunables of the comment engine.
#[derive(Debug, Clone)]
pub struct CommentSettings {
    /// New comments skip pre-moderation when true.
    pub auto_publish: bool,
    /// Deepest allowed reply, root comments being depth 0. `None` is unbounded.
    pub max_depth: Option<u32>,
    /// Replies attached to each top-level comment in a thread page.
    pub inline_replies: usize,
    pub max_media: usize,
    /// Interval of the background counter sweep, `None` disables it.
    pub resync_interval_secs: Option<u64>,
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            auto_publish: true,
            max_depth: Some(64),
            inline_replies: 3,
            max_media: 9,
            resync_interval_secs: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://comments.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let defaults = CommentSettings::default();
        let max_depth: u32 = parse_or("COMMENT_MAX_DEPTH", 64)?;
        let resync_interval_secs: u64 = parse_or("COMMENT_RESYNC_INTERVAL_SECS", 0)?;

        let comments = CommentSettings {
            auto_publish: parse_or("COMMENT_AUTO_PUBLISH", defaults.auto_publish)?,
            max_depth: (max_depth > 0).then_some(max_depth),
            inline_replies: parse_or("COMMENT_INLINE_REPLIES", defaults.inline_replies)?,
            max_media: parse_or("COMMENT_MAX_MEDIA", defaults.max_media)?,
            resync_interval_secs: (resync_interval_secs > 0).then_some(resync_interval_secs),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            port: parse_or("PORT", 3000)?,
            comments,
        })
    }
}

/// Reads `name` from the environment, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
