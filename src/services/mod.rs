// src/services/mod.rs

pub mod collaborators;
pub mod comment_store;
pub mod counter_sync;
pub mod database;
pub mod moderation;
pub mod relation_index;
pub mod tree;

pub use comment_store::CommentStore;
pub use tree::TreeAssembler;
