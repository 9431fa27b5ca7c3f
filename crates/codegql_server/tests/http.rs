//! Routing tests against the demo seed.

use bytes::Bytes;
use codegql_server::config::ServerConfig;
use codegql_server::http::{route, AppState};
use codegql_server::{build_state, load_seed};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::path::Path;

fn demo_state(config: ServerConfig) -> AppState {
    let seed = load_seed(Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/demo-seed.json"
    )))
    .unwrap();
    build_state(config, &seed)
}

fn graphql(uid: Option<&str>, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header("content-type", "application/json");
    if let Some(uid) = uid {
        builder = builder.header("x-actor-uid", uid);
    }
    builder.body(Full::new(body.into())).unwrap()
}

fn get(path: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn send(state: &AppState, req: Request<Full<Bytes>>) -> (StatusCode, Bytes) {
    let response = route(state, req).await;
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn send_json(state: &AppState, req: Request<Full<Bytes>>) -> (StatusCode, Value) {
    let (status, body) = send(state, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[test]
fn test_demo_seed_is_valid() {
    let seed = load_seed(Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/demo-seed.json"
    )))
    .unwrap();
    assert_eq!(seed.users.len(), 4);
    assert_eq!(seed.git.len(), 1);
}

#[tokio::test]
async fn test_health() {
    let state = demo_state(ServerConfig::new());
    let (status, body) = send_json(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_current_user_from_actor_header() {
    let state = demo_state(ServerConfig::new());
    let query = json!({"selection": {"currentUser": {"username": true}}}).to_string();

    let (status, body) = send_json(&state, graphql(Some("2"), query.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["currentUser"]["username"], "alice");
    assert!(body.get("errors").is_none());

    let (_, body) = send_json(&state, graphql(None, query)).await;
    assert_eq!(body["data"]["currentUser"], Value::Null);
}

#[tokio::test]
async fn test_root_teams() {
    let state = demo_state(ServerConfig::new());
    let body = json!({
        "selection": {"teams": {"args": {"first": 10}, "fields": {"nodes": {"name": true}}}}
    })
    .to_string();

    let (status, body) = send_json(&state, graphql(Some("2"), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["teams"]["nodes"],
        json!([{"name": "engineering"}, {"name": "support"}])
    );
}

#[tokio::test]
async fn test_teams_disabled_by_config() {
    let state = demo_state(ServerConfig::new().teams_enabled(false));
    let body = json!({
        "selection": {"teams": {"args": {"first": 10}, "fields": {"totalCount": true}}}
    })
    .to_string();

    let (_, body) = send_json(&state, graphql(Some("2"), body)).await;
    assert_eq!(body["data"]["teams"], Value::Null);
    assert_eq!(body["errors"][0]["extensions"]["code"], "FEATURE_DISABLED");
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let state = demo_state(ServerConfig::new());
    let (status, body) = send_json(&state, graphql(Some("2"), "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("invalid JSON"));
}

#[tokio::test]
async fn test_invalid_actor_header_is_bad_request() {
    let state = demo_state(ServerConfig::new());
    let body = json!({"selection": {"currentUser": {"id": true}}}).to_string();
    let (status, body) = send_json(&state, graphql(Some("-3"), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "invalid X-Actor-UID header");
}

#[tokio::test]
async fn test_playground_toggle() {
    let state = demo_state(ServerConfig::new());
    let (status, body) = send(&state, get("/graphql")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("<h1>codegql</h1>"));

    let state = demo_state(ServerConfig::new().no_playground());
    let (status, _) = send(&state, get("/graphql")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route() {
    let state = demo_state(ServerConfig::new());
    let (status, _) = send(&state, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn internal_graphql(body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header("content-type", "application/json")
        .header("x-actor-internal", "1")
        .body(Full::new(body.into()))
        .unwrap()
}

#[tokio::test]
async fn test_internal_actor_needs_trusted_header() {
    let query = json!({
        "selection": {"users": {"args": {"first": 10}, "fields": {"totalCount": true}}}
    })
    .to_string();

    let state = demo_state(ServerConfig::new());
    let (status, body) = send_json(&state, internal_graphql(query.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errors"][0]["extensions"]["code"], "FORBIDDEN");

    let state = demo_state(ServerConfig::new().trust_internal_header(true));
    let (status, body) = send_json(&state, internal_graphql(query)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["users"]["totalCount"], 4);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let state = demo_state(ServerConfig::new().max_body_bytes(64));
    let padding = "x".repeat(128);
    let body = json!({"selection": {"currentUser": {"username": true}}, "padding": padding});
    let (status, body) = send_json(&state, graphql(Some("2"), body.to_string())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["errors"][0]["message"], "request body exceeds 64 bytes");
}
