use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ApiError, ApiResult, FieldErrors, PASSWORD_MIN_LEN, USERNAME_MAX_LEN, db};

use super::password;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const DUPLICATE_USERNAME: &str = "A member with that username already exists.";
const INVALID_CREDENTIALS: &str = "Invalid username or password.";

fn weak_password() -> String {
    format!("Password must be at least {PASSWORD_MIN_LEN} characters.")
}

fn username_too_long() -> String {
    format!("Username may not be longer than {USERNAME_MAX_LEN} characters.")
}

/// A registered identity. The password hash never leaves this module.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn register(
    db_pool: &SqlitePool,
    username: Option<&str>,
    password: Option<&str>,
) -> ApiResult<Member> {
    let mut errors = FieldErrors::default();

    let username = validate_username(username, &mut errors);
    if let Some(name) = username
        && username_taken(db_pool, name).await?
    {
        errors.push("username", DUPLICATE_USERNAME);
    }
    let password = validate_password(password, &mut errors);

    let (Some(name), Some(raw), true) = (username, password, errors.is_empty()) else {
        return Err(ApiError::Validation(errors));
    };

    let id = Uuid::now_v7();
    let created_at = OffsetDateTime::now_utc();
    let hash = password::hash(raw)?;

    let inserted = sqlx::query(
        "INSERT INTO members (id,username,password_hash,created_at) VALUES (?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(&hash)
    .bind(db::encode_timestamp(created_at))
    .execute(db_pool)
    .await;

    match inserted {
        Ok(_) => Ok(Member {
            id,
            username: name.to_owned(),
            created_at,
        }),
        // lost the race against a concurrent registration of the same name
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(ApiError::Validation(
            FieldErrors::single("username", DUPLICATE_USERNAME),
        )),
        Err(err) => Err(err.into()),
    }
}

/// Unknown username and wrong password produce the same error, so the
/// response never reveals whether a username exists.
pub async fn verify(
    db_pool: &SqlitePool,
    username: Option<&str>,
    password: Option<&str>,
) -> ApiResult<Member> {
    let mut errors = FieldErrors::default();
    let username = match username.map(str::trim) {
        None => {
            errors.push("username", REQUIRED);
            None
        }
        Some("") => {
            errors.push("username", BLANK);
            None
        }
        Some(name) => Some(name),
    };
    let password = match password {
        None => {
            errors.push("password", REQUIRED);
            None
        }
        Some("") => {
            errors.push("password", BLANK);
            None
        }
        Some(raw) => Some(raw),
    };
    let (Some(name), Some(raw)) = (username, password) else {
        return Err(ApiError::Validation(errors));
    };

    let row: Option<(String, String, String, i64)> = sqlx::query_as(
        "SELECT id,username,password_hash,created_at FROM members WHERE username=?",
    )
    .bind(name)
    .fetch_optional(db_pool)
    .await?;

    let Some((id, username, stored_hash, created_at)) = row else {
        return Err(invalid_credentials());
    };
    if !password::verify(raw, &stored_hash) {
        return Err(invalid_credentials());
    }

    Ok(Member {
        id: Uuid::parse_str(&id)?,
        username,
        created_at: db::decode_timestamp(created_at)?,
    })
}

/// Both fields are optional; each is validated independently and all
/// failures come back in one response.
pub async fn update_profile(
    db_pool: &SqlitePool,
    member: &Member,
    username: Option<&str>,
    password: Option<&str>,
) -> ApiResult<Member> {
    let mut errors = FieldErrors::default();

    let mut new_username = None;
    if let Some(name) = username.map(str::trim)
        && name != member.username
    {
        if name.is_empty() {
            errors.push("username", BLANK);
        } else if name.chars().count() > USERNAME_MAX_LEN {
            errors.push("username", username_too_long());
        } else if username_taken_by_other(db_pool, name, member.id).await? {
            errors.push("username", DUPLICATE_USERNAME);
        } else {
            new_username = Some(name);
        }
    }

    let mut new_hash = None;
    if let Some(raw) = password {
        if raw.chars().count() < PASSWORD_MIN_LEN {
            errors.push("password", weak_password());
        } else {
            new_hash = Some(password::hash(raw)?);
        }
    }

    errors.into_result()?;

    if let Some(name) = new_username {
        let updated = sqlx::query("UPDATE members SET username=? WHERE id=?")
            .bind(name)
            .bind(member.id.to_string())
            .execute(db_pool)
            .await;
        match updated {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(ApiError::Validation(FieldErrors::single(
                    "username",
                    DUPLICATE_USERNAME,
                )));
            }
            Err(err) => return Err(err.into()),
        }
    }
    if let Some(hash) = new_hash {
        sqlx::query("UPDATE members SET password_hash=? WHERE id=?")
            .bind(&hash)
            .bind(member.id.to_string())
            .execute(db_pool)
            .await?;
    }

    Ok(Member {
        id: member.id,
        username: new_username
            .map(str::to_owned)
            .unwrap_or_else(|| member.username.clone()),
        created_at: member.created_at,
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::Validation(FieldErrors::single("non_field_errors", INVALID_CREDENTIALS))
}

fn validate_username<'a>(username: Option<&'a str>, errors: &mut FieldErrors) -> Option<&'a str> {
    match username.map(str::trim) {
        None => {
            errors.push("username", REQUIRED);
            None
        }
        Some("") => {
            errors.push("username", BLANK);
            None
        }
        Some(name) if name.chars().count() > USERNAME_MAX_LEN => {
            errors.push("username", username_too_long());
            None
        }
        Some(name) => Some(name),
    }
}

fn validate_password<'a>(password: Option<&'a str>, errors: &mut FieldErrors) -> Option<&'a str> {
    match password {
        None => {
            errors.push("password", REQUIRED);
            None
        }
        Some(raw) if raw.chars().count() < PASSWORD_MIN_LEN => {
            errors.push("password", weak_password());
            None
        }
        Some(raw) => Some(raw),
    }
}

async fn username_taken(db_pool: &SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query_as::<_, ()>("SELECT 1 FROM members WHERE username=?")
            .bind(name)
            .fetch_optional(db_pool)
            .await?
            .is_some(),
    )
}

async fn username_taken_by_other(
    db_pool: &SqlitePool,
    name: &str,
    member_id: Uuid,
) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query_as::<_, ()>("SELECT 1 FROM members WHERE username=? AND id<>?")
            .bind(name)
            .bind(member_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_some(),
    )
}
