use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ApiResult, TOKEN_BYTES, db, members::Member};

/// Issues a fresh opaque key for the member, replacing any live token.
/// 20 random bytes hex-encoded: 40 characters, 160 bits of entropy.
pub async fn issue(db_pool: &SqlitePool, member_id: Uuid) -> ApiResult<String> {
    let key = hex::encode(rand::random::<[u8; TOKEN_BYTES]>());

    sqlx::query("DELETE FROM member_tokens WHERE member_id=?")
        .bind(member_id.to_string())
        .execute(db_pool)
        .await?;
    sqlx::query("INSERT INTO member_tokens (key,member_id,created_at) VALUES (?,?,?)")
        .bind(&key)
        .bind(member_id.to_string())
        .bind(db::encode_timestamp(OffsetDateTime::now_utc()))
        .execute(db_pool)
        .await?;

    Ok(key)
}

pub async fn resolve(db_pool: &SqlitePool, key: &str) -> ApiResult<Option<Member>> {
    let row: Option<(String, String, i64)> = sqlx::query_as(
        "SELECT m.id,m.username,m.created_at
         FROM member_tokens t JOIN members m ON m.id = t.member_id
         WHERE t.key = ?",
    )
    .bind(key)
    .fetch_optional(db_pool)
    .await?;

    match row {
        Some((id, username, created_at)) => Ok(Some(Member {
            id: Uuid::parse_str(&id)?,
            username,
            created_at: db::decode_timestamp(created_at)?,
        })),
        None => Ok(None),
    }
}
