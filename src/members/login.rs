use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{ApiResult, auth::tokens};

use super::store;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    username: Option<String>,
    password: Option<String>,
}

/// Any previous session token is invalidated when the new one is issued.
#[debug_handler]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    Json(LoginBody { username, password }): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    let member = store::verify(&db_pool, username.as_deref(), password.as_deref()).await?;
    let token = tokens::issue(&db_pool, member.id).await?;
    info!(username = %member.username, "member logged in");

    Ok(Json(json!({ "token": token, "member": member })))
}
