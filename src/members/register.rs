use axum::{Json, debug_handler, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::ApiResult;

use super::store;

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterBody {
    username: Option<String>,
    password: Option<String>,
}

#[debug_handler]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    Json(RegisterBody { username, password }): Json<RegisterBody>,
) -> ApiResult<impl IntoResponse> {
    let member = store::register(&db_pool, username.as_deref(), password.as_deref()).await?;
    info!(username = %member.username, "member registered");
    Ok((StatusCode::CREATED, Json(member)))
}
