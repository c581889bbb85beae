// src/utils/mod.rs

pub mod cursor;
pub mod html;
pub mod jwt;
pub mod time;
