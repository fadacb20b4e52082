use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt;

use chatline::{AppState, app, db};

async fn test_app() -> Router {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::prepare(&db_pool).await.unwrap();
    app(AppState { db_pool })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_authed(method: &str, uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/members/register/",
            &json!({ "username": username, "password": password }),
        ),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/members/login/",
            &json!({ "username": username, "password": password }),
        ),
    )
    .await
}

async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = login(app, username, password).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn register_returns_member_without_password() {
    let app = test_app().await;

    let (status, body) = register(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert!(body["id"].is_string());
    assert!(body["created_at"].is_string());
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn register_validation_errors_accumulate() {
    let app = test_app().await;

    let (status, body) = send(&app, post_json("/members/register/", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"][0].is_string());
    assert!(body["password"][0].is_string());

    let (status, body) = register(&app, "alice", "12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["password"][0]
            .as_str()
            .unwrap()
            .contains("at least 6 characters")
    );
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = test_app().await;

    let (status, _) = register(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "alice", "secret2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"][0].as_str().unwrap().contains("exists"));
}

#[tokio::test]
async fn relogin_replaces_the_previous_token() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;

    let (status, body) = login(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    let first = body["token"].as_str().unwrap().to_owned();
    assert_eq!(first.len(), 40);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(body["member"]["username"], "alice");

    let second = login_token(&app, "alice", "secret1").await;
    assert_ne!(first, second);

    let (status, _) = send(&app, get_authed("/chat/messages/", &first)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, get_authed("/chat/messages/", &second)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_failure_is_generic_for_unknown_and_wrong() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;

    let (unknown_status, unknown_body) = login(&app, "nobody", "secret1").await;
    let (wrong_status, wrong_body) = login(&app, "alice", "wrong-pass").await;

    assert_eq!(unknown_status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown_body, wrong_body);
    assert!(unknown_body["non_field_errors"][0].is_string());
}

#[tokio::test]
async fn protected_endpoints_require_a_valid_token() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;

    for uri in ["/members/me/", "/chat/messages/"] {
        let (status, _) = send(
            &app,
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "no header, {uri}");

        for value in ["Token abc", "bearer abc", "Bearer", "Bearer a b"] {
            let (status, _) = send(
                &app,
                Request::builder()
                    .uri(uri)
                    .header(header::AUTHORIZATION, value)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{value:?}, {uri}");
        }

        let (status, body) = send(&app, get_authed(uri, &"0".repeat(40))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "unknown token, {uri}");
        assert_eq!(body["detail"], "Invalid token.");
    }
}

#[tokio::test]
async fn profile_roundtrip_and_update() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;
    let token = login_token(&app, "alice", "secret1").await;

    let (status, body) = send(&app, get_authed("/members/me/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, body) = send(
        &app,
        json_authed(
            "PUT",
            "/members/me/",
            &token,
            &json!({ "username": "alicia", "password": "secret2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alicia");

    // the old token still identifies the member after the update
    let (status, body) = send(&app, get_authed("/members/me/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alicia");

    login_token(&app, "alicia", "secret2").await;
    let (status, _) = login(&app, "alicia", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_update_reports_both_field_errors() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;
    register(&app, "bob", "secret1").await;
    let token = login_token(&app, "bob", "secret1").await;

    let (status, body) = send(
        &app,
        json_authed(
            "PUT",
            "/members/me/",
            &token,
            &json!({ "username": "alice", "password": "123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"][0].as_str().unwrap().contains("exists"));
    assert!(
        body["password"][0]
            .as_str()
            .unwrap()
            .contains("at least 6 characters")
    );
}

#[tokio::test]
async fn message_content_is_validated() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;
    let token = login_token(&app, "alice", "secret1").await;

    let (status, body) = send(
        &app,
        json_authed("POST", "/chat/messages/", &token, &json!({ "content": "  \n " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["content"][0].as_str().unwrap().contains("empty"));

    let at_cap = "x".repeat(1000);
    let (status, body) = send(
        &app,
        json_authed("POST", "/chat/messages/", &token, &json!({ "content": at_cap })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["member"], "alice");
    assert_eq!(body["content"].as_str().unwrap().len(), 1000);

    let over_cap = "x".repeat(1001);
    let (status, body) = send(
        &app,
        json_authed("POST", "/chat/messages/", &token, &json!({ "content": over_cap })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["content"][0].as_str().unwrap().contains("too long"));
}

#[tokio::test]
async fn feed_is_ordered_oldest_first() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;
    let token = login_token(&app, "alice", "secret1").await;

    for content in ["A", "B", "C"] {
        let (status, _) = send(
            &app,
            json_authed("POST", "/chat/messages/", &token, &json!({ "content": content })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get_authed("/chat/messages/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let feed: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(feed, ["A", "B", "C"]);
}

#[tokio::test]
async fn feed_is_capped_at_the_most_recent_50() {
    let app = test_app().await;
    register(&app, "alice", "secret1").await;
    let token = login_token(&app, "alice", "secret1").await;

    for n in 1..=60 {
        let (status, _) = send(
            &app,
            json_authed(
                "POST",
                "/chat/messages/",
                &token,
                &json!({ "content": format!("msg {n}") }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get_authed("/chat/messages/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let feed = body.as_array().unwrap();
    assert_eq!(feed.len(), 50);
    assert_eq!(feed.first().unwrap()["content"], "msg 11");
    assert_eq!(feed.last().unwrap()["content"], "msg 60");
}
