//! SQLite connection settings and write transactions.
//!
//! Writers take the database write lock when their transaction opens
//! (`BEGIN IMMEDIATE`). A deferred `BEGIN` that reads first and writes later
//! fails with `SQLITE_BUSY` when another connection upgrades first; an immediate
//! one waits in the busy handler instead.

use std::{str::FromStr, time::Duration};

use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous},
};

use crate::error::CommentError;

/// How long a connection waits for the write lock before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for a file or memory database URL: WAL so readers never block the
/// writer, foreign keys on, and a busy timeout for contended writes.
pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    Ok(options)
}

/// Opens a transaction holding the write lock from its first statement.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, CommentError> {
    let tx = pool.begin_with("BEGIN IMMEDIATE").await?;
    Ok(tx)
}
