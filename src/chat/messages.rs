use axum::{Json, debug_handler, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{ApiResult, RECENT_MESSAGE_LIMIT, auth::CurrentMember};

use super::store::{self, ChatMessage};

#[debug_handler]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    CurrentMember(_member): CurrentMember,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    Ok(Json(store::recent(&db_pool, RECENT_MESSAGE_LIMIT).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostBody {
    content: Option<String>,
}

#[debug_handler]
pub(crate) async fn post(
    State(db_pool): State<SqlitePool>,
    CurrentMember(member): CurrentMember,
    Json(PostBody { content }): Json<PostBody>,
) -> ApiResult<impl IntoResponse> {
    let message = store::append(&db_pool, &member, content.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
