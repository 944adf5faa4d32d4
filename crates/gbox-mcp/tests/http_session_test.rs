//! Session routing tests for the Streamable HTTP surface.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use gbox_mcp::{build_managers, build_router};
use gbox_mcp_core::{Platform, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const SESSION_HEADER: &str = "mcp-session-id";

fn app(max_sessions: usize) -> Router {
    let mut config = ServerConfig::default();
    config.server.max_sessions = max_sessions;
    build_router(build_managers(&config))
}

fn initialize(id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": { "name": "router-test", "version": "1.0" }
        }
    })
}

fn post(uri: &str, session: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare(method: &str, uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Initialize a session and acknowledge it; returns the session id.
async fn open_session(app: &Router, platform: &str) -> String {
    let uri = format!("/mcp/{platform}");
    let response = app
        .clone()
        .oneshot(post(&uri, None, &initialize(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session_id = response.headers()[SESSION_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(
        body["result"]["serverInfo"]["name"],
        format!("gbox-{platform}-{session_id}")
    );

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = app
        .clone()
        .oneshot(post(&uri, Some(&session_id), &initialized))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    session_id
}

async fn health(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(bare("GET", "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_post_without_session_or_initialize_is_rejected() {
    let app = app(10);
    let list = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });

    let response = app.oneshot(post("/mcp/android", None, &list)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(
        body["error"]["message"],
        "Bad Request: No valid session ID provided"
    );
    assert!(body["id"].is_null());
}

#[tokio::test]
async fn test_get_with_unknown_session_is_rejected() {
    let app = app(10);

    let response = app
        .clone()
        .oneshot(bare("GET", "/mcp/linux", Some("unknown-id")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"Invalid or missing session ID");

    let response = app
        .oneshot(bare("DELETE", "/mcp/linux", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"Invalid or missing session ID");
}

#[tokio::test]
async fn test_initialize_with_unknown_session_id_is_rejected() {
    let app = app(10);

    let response = app
        .clone()
        .oneshot(post("/mcp/android", Some("stale-id"), &initialize(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SESSION_HEADER).is_none());

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(
        body["error"]["message"],
        "Bad Request: No valid session ID provided"
    );
    assert!(body["id"].is_null());

    assert_eq!(health(&app).await["activeSessions"]["android"], 0);
}

#[tokio::test]
async fn test_capacity_limit_keeps_first_session_usable() {
    let app = app(1);
    let first = open_session(&app, "android").await;

    let response = app
        .clone()
        .oneshot(post("/mcp/android", None, &initialize(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], -32000);

    let ping = json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" });
    let response = app
        .clone()
        .oneshot(post("/mcp/android", Some(&first), &ping))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 2);

    assert_eq!(health(&app).await["activeSessions"]["android"], 1);
}

#[tokio::test]
async fn test_capacity_is_per_platform() {
    let app = app(1);
    open_session(&app, "android").await;
    open_session(&app, "browser").await;

    let body = health(&app).await;
    assert_eq!(body["activeSessions"]["android"], 1);
    assert_eq!(body["activeSessions"]["browser"], 1);
    assert_eq!(body["activeSessions"]["linux"], 0);
}

#[tokio::test]
async fn test_healthz_is_independent_of_sessions() {
    let app = app(1);

    let response = app
        .clone()
        .oneshot(bare("GET", "/healthz", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");

    open_session(&app, "linux").await;
    let rejected = app
        .clone()
        .oneshot(post("/mcp/linux", None, &initialize(1)))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.oneshot(bare("GET", "/healthz", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_platform_is_rejected() {
    let app = app(10);

    let response = app
        .oneshot(post("/mcp/windows", None, &initialize(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("windows"));
}

#[tokio::test]
async fn test_disabled_platform_is_rejected() {
    let mut config = ServerConfig::default();
    config.server.platforms = vec![Platform::Android];
    let app = build_router(build_managers(&config));

    let response = app
        .oneshot(post("/mcp/linux", None, &initialize(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_lists_platform_tools() {
    let app = app(10);
    let session = open_session(&app, "android").await;

    let list = json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" });
    let response = app
        .clone()
        .oneshot(post("/mcp/android", Some(&session), &list))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let mut names: Vec<String> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();

    let mut expected: Vec<String> = Platform::Android.tool_names().map(String::from).collect();
    expected.sort();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_reinitializing_existing_session_is_rejected() {
    let app = app(10);
    let session = open_session(&app, "android").await;

    let response = app
        .oneshot(post("/mcp/android", Some(&session), &initialize(5)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32600);
}

#[tokio::test]
async fn test_delete_tears_down_session() {
    let app = app(10);
    let session = open_session(&app, "browser").await;
    assert_eq!(health(&app).await["activeSessions"]["browser"], 1);

    let response = app
        .clone()
        .oneshot(bare("DELETE", "/mcp/browser", Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SESSION_HEADER], session.as_str());

    assert_eq!(health(&app).await["activeSessions"]["browser"], 0);

    let response = app
        .clone()
        .oneshot(bare("GET", "/mcp/browser", Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let ping = json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" });
    let response = app
        .oneshot(post("/mcp/browser", Some(&session), &ping))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32000);
}

#[tokio::test]
async fn test_event_stream_requires_accept_header() {
    let app = app(10);
    let session = open_session(&app, "linux").await;

    let response = app
        .clone()
        .oneshot(bare("GET", "/mcp/linux", Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    let request = Request::builder()
        .method("GET")
        .uri("/mcp/linux")
        .header(SESSION_HEADER, session.as_str())
        .header(header::ACCEPT, "text/event-stream")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
}
