pub mod auth;
pub mod chat;
pub mod db;
pub mod members;

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

// Input limits enforced by the stores, plus the token and feed-window sizes.
pub const PASSWORD_MIN_LEN: usize = 6;
pub const USERNAME_MAX_LEN: usize = 150;
pub const TOKEN_BYTES: usize = 20;
pub const MESSAGE_MAX_LEN: usize = 1000;
pub const RECENT_MESSAGE_LIMIT: i64 = 50;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/members", members::router())
        .nest("/chat", chat::router())
        .with_state(state)
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Field-scoped input errors, serialized as `{field: [messages...]}`.
    Validation(FieldErrors),
    Auth(AuthError),
    Internal(anyhow::Error),
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            Self::Auth(err) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": err.message() })),
            )
                .into_response(),
            Self::Internal(err) => {
                tracing::error!("unhandled error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    NotAuthenticated,
    MalformedHeader,
    InvalidToken,
}

impl AuthError {
    pub fn message(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Authentication credentials were not provided.",
            Self::MalformedHeader => "Invalid token header.",
            Self::InvalidToken => "Invalid token.",
        }
    }
}

/// Per-field validation failures; checks accumulate instead of short-circuiting.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}
