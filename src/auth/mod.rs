pub mod tokens;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use sqlx::SqlitePool;

use crate::{ApiError, ApiResult, AuthError, members::Member};

const BEARER_SCHEME: &str = "Bearer";

/// Maps the Authorization header to a member. An absent header means
/// anonymous; the endpoint decides whether that is acceptable. The scheme
/// match is case-sensitive and the header must be exactly two parts.
pub async fn resolve_bearer(
    headers: &HeaderMap,
    db_pool: &SqlitePool,
) -> ApiResult<Option<Member>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Auth(AuthError::MalformedHeader))?;

    let mut parts = value.split_whitespace();
    let (Some(scheme), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ApiError::Auth(AuthError::MalformedHeader));
    };
    if scheme != BEARER_SCHEME {
        return Err(ApiError::Auth(AuthError::MalformedHeader));
    }

    match tokens::resolve(db_pool, key).await? {
        Some(member) => Ok(Some(member)),
        None => Err(ApiError::Auth(AuthError::InvalidToken)),
    }
}

/// Extractor for endpoints that require an authenticated member; handlers
/// receive the identity explicitly instead of digging it out of the request.
pub struct CurrentMember(pub Member);

impl<S> FromRequestParts<S> for CurrentMember
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db_pool = SqlitePool::from_ref(state);
        match resolve_bearer(&parts.headers, &db_pool).await? {
            Some(member) => Ok(Self(member)),
            None => Err(ApiError::Auth(AuthError::NotAuthenticated)),
        }
    }
}
