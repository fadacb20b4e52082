use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::OffsetDateTime;

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
}

/// Idempotent schema setup; uniqueness constraints double as the race net
/// against concurrent duplicate registration or simultaneous login.
pub async fn prepare(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS member_tokens (
            key TEXT PRIMARY KEY,
            member_id TEXT NOT NULL UNIQUE REFERENCES members(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chat_messages (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    Ok(())
}

/// `created_at` columns hold unix nanoseconds; RFC 3339 text trims trailing
/// subsecond zeros, so it does not sort chronologically. Integers do.
pub(crate) fn encode_timestamp(at: OffsetDateTime) -> i64 {
    at.unix_timestamp_nanos() as i64
}

pub(crate) fn decode_timestamp(nanos: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // one connection, so every query sees the same :memory: database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    prepare(&db_pool).await.unwrap();
    db_pool
}
