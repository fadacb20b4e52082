mod login;
mod me;
mod register;

pub mod password;
pub mod store;

pub use store::Member;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register::register))
        .route("/login/", post(login::login))
        .route("/me/", get(me::profile).put(me::update_profile))
}
