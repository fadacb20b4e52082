use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ApiError, ApiResult, FieldErrors, MESSAGE_MAX_LEN, db, members::Member};

const REQUIRED: &str = "This field is required.";
const EMPTY_CONTENT: &str = "Message cannot be empty.";

fn content_too_long() -> String {
    format!("Message too long. Maximum {MESSAGE_MAX_LEN} characters.")
}

/// One posted entry in the shared feed. `member` is the author's username.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub member: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn append(
    db_pool: &SqlitePool,
    member: &Member,
    content: Option<&str>,
) -> ApiResult<ChatMessage> {
    let content = match content.map(str::trim) {
        None => {
            return Err(ApiError::Validation(FieldErrors::single(
                "content", REQUIRED,
            )));
        }
        Some("") => {
            return Err(ApiError::Validation(FieldErrors::single(
                "content",
                EMPTY_CONTENT,
            )));
        }
        Some(text) if text.chars().count() > MESSAGE_MAX_LEN => {
            return Err(ApiError::Validation(FieldErrors::single(
                "content",
                content_too_long(),
            )));
        }
        Some(text) => text,
    };

    let id = Uuid::now_v7();
    let created_at = OffsetDateTime::now_utc();
    sqlx::query("INSERT INTO chat_messages (id,member_id,content,created_at) VALUES (?,?,?,?)")
        .bind(id.to_string())
        .bind(member.id.to_string())
        .bind(content)
        .bind(db::encode_timestamp(created_at))
        .execute(db_pool)
        .await?;

    Ok(ChatMessage {
        id,
        member: member.username.clone(),
        content: content.to_owned(),
        created_at,
    })
}

/// The newest `limit` messages, returned oldest-first for display.
/// uuid v7 ids are time-ordered and break timestamp ties.
pub async fn recent(db_pool: &SqlitePool, limit: i64) -> ApiResult<Vec<ChatMessage>> {
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
        "SELECT m.id,a.username,m.content,m.created_at
         FROM chat_messages m JOIN members a ON a.id = m.member_id
         ORDER BY m.created_at DESC, m.id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db_pool)
    .await?;

    let mut messages = Vec::with_capacity(rows.len());
    for (id, member, content, created_at) in rows {
        messages.push(ChatMessage {
            id: Uuid::parse_str(&id)?,
            member,
            content,
            created_at: db::decode_timestamp(created_at)?,
        });
    }
    messages.reverse();
    Ok(messages)
}
