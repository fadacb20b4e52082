mod messages;

pub mod store;

pub use store::ChatMessage;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/messages/", get(messages::list).post(messages::post))
}
