use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{ApiResult, AppState, auth::CurrentMember};

use super::store::{self, Member};

#[debug_handler(state = AppState)]
pub(crate) async fn profile(CurrentMember(member): CurrentMember) -> Json<Member> {
    Json(member)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileBody {
    username: Option<String>,
    password: Option<String>,
}

#[debug_handler]
pub(crate) async fn update_profile(
    State(db_pool): State<SqlitePool>,
    CurrentMember(member): CurrentMember,
    Json(ProfileBody { username, password }): Json<ProfileBody>,
) -> ApiResult<Json<Member>> {
    let updated =
        store::update_profile(&db_pool, &member, username.as_deref(), password.as_deref()).await?;
    Ok(Json(updated))
}
