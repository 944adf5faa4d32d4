//! HTTP session router.
//!
//! Maps `/mcp/{platform}` requests onto per-platform session managers,
//! creating a session for every new `initialize` request and forwarding the
//! rest to the transport of the session named by the `mcp-session-id` header.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use gbox_mcp_core::{Error, Platform, SessionId};
use gbox_mcp_session::SessionManager;

use crate::device::ClientOptions;
use crate::protocol::GboxBackend;
use crate::transport::http::StreamableHttpTransport;
use crate::transport::message::{
    error_body, error_response, is_initialize, parse_message, INTERNAL_ERROR, SERVER_ERROR,
    SESSION_ID_HEADER,
};

/// Session managers keyed by the platform they serve.
pub type Managers = HashMap<Platform, SessionManager<GboxBackend>>;

#[derive(Clone)]
struct AppState {
    managers: Arc<Managers>,
}

/// Failures surfaced by the router before or around a transport.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The path names a platform that is unknown or not enabled.
    #[error("unsupported platform: {0}")]
    BadPlatform(String),
    /// No usable session id for a non-initialize request.
    #[error("no valid session id for {0} request")]
    InvalidSession(Method),
    /// The platform's session manager is full.
    #[error("session limit of {0} reached")]
    CapacityExceeded(usize),
    /// The session or its transport failed.
    #[error("transport failure: {0}")]
    Transport(Error),
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        match self {
            RouterError::BadPlatform(platform) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("Unsupported platform: {platform}"),
                    "supported": Platform::ALL.iter().map(Platform::name).collect::<Vec<_>>(),
                })),
            )
                .into_response(),
            RouterError::InvalidSession(Method::POST) => error_response(
                StatusCode::BAD_REQUEST,
                SERVER_ERROR,
                "Bad Request: No valid session ID provided",
            ),
            RouterError::InvalidSession(_) => {
                (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
            }
            RouterError::CapacityExceeded(max) => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                SERVER_ERROR,
                &format!("Service Unavailable: session limit of {max} reached"),
            ),
            RouterError::Transport(e) => {
                error!("Transport failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(error_body(INTERNAL_ERROR, "Internal server error", Value::Null)),
                )
                    .into_response()
            }
        }
    }
}

impl From<Error> for RouterError {
    fn from(e: Error) -> Self {
        match e {
            Error::SessionLimitReached(max) => RouterError::CapacityExceeded(max),
            Error::UnsupportedPlatform(platform) => RouterError::BadPlatform(platform),
            other => RouterError::Transport(other),
        }
    }
}

/// Build the HTTP application for the given session managers.
pub fn build_router(managers: Managers) -> Router {
    let state = AppState {
        managers: Arc::new(managers),
    };

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/health", get(health_handler))
        .route(
            "/mcp/{platform}",
            get(mcp_handler).post(mcp_handler).delete(mcp_handler),
        )
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut platforms: Vec<Platform> = state.managers.keys().copied().collect();
    platforms.sort_unstable();

    let active: serde_json::Map<String, Value> = platforms
        .iter()
        .filter_map(|platform| {
            let manager = state.managers.get(platform)?;
            Some((platform.name().to_string(), json!(manager.session_count())))
        })
        .collect();

    Json(json!({
        "status": "healthy",
        "activeSessions": active,
        "platforms": platforms.iter().map(Platform::name).collect::<Vec<_>>(),
    }))
}

fn resolve_manager<'a>(
    state: &'a AppState,
    platform: &str,
) -> Result<&'a SessionManager<GboxBackend>, RouterError> {
    let parsed: Platform = platform
        .parse()
        .map_err(|_| RouterError::BadPlatform(platform.to_string()))?;
    state
        .managers
        .get(&parsed)
        .ok_or_else(|| RouterError::BadPlatform(platform.to_string()))
}

fn header_session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(SessionId::from)
}

/// Client options derived from a bearer token, when present.
fn client_options(headers: &HeaderMap) -> Option<ClientOptions> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ClientOptions::with_api_key)
}

async fn mcp_handler(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RouterError> {
    let manager = resolve_manager(&state, &platform)?;

    // A supplied id must name a live session; only id-less requests may initialize.
    if let Some(id) = header_session_id(&headers) {
        let Some(session) = manager.get_session(&id) else {
            debug!("Unknown session id {} for {}", id, method);
            return Err(RouterError::InvalidSession(method));
        };
        debug!("Routing {} to session {}", method, id);

        let transport = session.transport();
        let response = match method {
            Method::POST => transport.post(&body).await?,
            Method::GET => transport.get(&headers).await?,
            _ => transport.delete(),
        };
        return Ok(response);
    }

    let initializing =
        method == Method::POST && parse_message(&body).is_ok_and(|message| is_initialize(&message));
    if !initializing {
        return Err(RouterError::InvalidSession(method));
    }

    let transport = start_session(manager, &headers)?;
    Ok(transport.post(&body).await?)
}

/// Create a session with a fresh id and connect its server to a new transport.
fn start_session(
    manager: &SessionManager<GboxBackend>,
    headers: &HeaderMap,
) -> Result<Arc<StreamableHttpTransport>, RouterError> {
    let id = SessionId::generate();
    let transport = StreamableHttpTransport::new(id.clone());

    let weak = manager.downgrade();
    transport.on_close(move |id| {
        if let Some(manager) = weak.upgrade() {
            if manager.destroy_session(id) {
                info!("Session closed: session_id={}", id);
            }
        }
    });

    let session = match manager.create_session(id, Arc::clone(&transport), client_options(headers))
    {
        Ok(session) => session,
        Err(e) => {
            warn!("Failed to create session: {}", e);
            transport.close();
            return Err(e.into());
        }
    };

    if let Err(e) = transport.connect(session.server().clone()) {
        manager.destroy_session(session.id());
        return Err(e.into());
    }

    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_options_from_bearer() {
        let mut headers = HeaderMap::new();
        assert!(client_options(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer gbox_123"));
        let options = client_options(&headers).unwrap();
        assert_eq!(options.api_key.as_deref(), Some("gbox_123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(client_options(&headers).is_none());
    }

    #[test]
    fn test_header_session_id() {
        let mut headers = HeaderMap::new();
        assert!(header_session_id(&headers).is_none());

        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("  "));
        assert!(header_session_id(&headers).is_none());

        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(header_session_id(&headers).unwrap().as_str(), "abc");
    }

    #[test]
    fn test_error_mapping() {
        let limit: RouterError = Error::SessionLimitReached(5).into();
        assert_eq!(limit.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let closed: RouterError = Error::TransportClosed.into();
        assert_eq!(
            closed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let bad = RouterError::BadPlatform("windows".into());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
