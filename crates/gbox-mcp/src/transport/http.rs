//! Streamable HTTP session transport.
//!
//! Each session owns one [`StreamableHttpTransport`], a thin wrapper around an
//! rmcp local session. rmcp's session worker does the JSON-RPC plumbing; this
//! type adds the HTTP status rules, initialize gating, the single standalone
//! event stream, and close notification back to the session manager.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::streamable_http_server::session::local::{
    create_local_session, LocalSessionHandle, LocalSessionWorker, SessionConfig,
};
use rmcp::transport::common::server_side_http::ServerSseMessage;
use rmcp::{ServerHandler, ServiceExt};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use gbox_mcp_core::{Error, Result, SessionId};
use gbox_mcp_session::SessionTransport;

use crate::transport::message::{
    error_response, is_initialize, parse_message, INVALID_REQUEST, SERVER_ERROR,
    SESSION_ID_HEADER,
};

type CloseCallback = Box<dyn FnOnce(&SessionId) + Send>;

/// Clears the stream flag when the event stream is dropped.
struct StreamGuard(Arc<AtomicBool>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Transport handle bound to one session id.
pub struct StreamableHttpTransport {
    session_id: SessionId,
    handle: LocalSessionHandle,
    worker: Mutex<Option<LocalSessionWorker>>,
    service: Mutex<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
    stream_open: Arc<AtomicBool>,
    closed: AtomicBool,
    on_close: Mutex<Option<CloseCallback>>,
}

impl StreamableHttpTransport {
    /// Create an unconnected transport for `session_id`.
    pub fn new(session_id: SessionId) -> Arc<Self> {
        let (handle, worker) = create_local_session(session_id.as_str(), SessionConfig::default());
        Arc::new(Self {
            session_id,
            handle,
            worker: Mutex::new(Some(worker)),
            service: Mutex::new(None),
            initialized: AtomicBool::new(false),
            stream_open: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            on_close: Mutex::new(None),
        })
    }

    /// Session this transport serves.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Whether an `initialize` request has been accepted.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Register the callback fired once when the transport closes.
    ///
    /// Fires immediately if the transport is already closed.
    pub fn on_close(&self, callback: impl FnOnce(&SessionId) + Send + 'static) {
        if self.closed.load(Ordering::SeqCst) {
            callback(&self.session_id);
            return;
        }
        *self.on_close.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Start serving `server` on this session.
    pub fn connect<S: ServerHandler>(self: &Arc<Self>, server: S) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::Transport("transport already connected".to_string()))?;

        let weak = Arc::downgrade(self);
        let session_id = self.session_id.clone();
        let service = tokio::spawn(async move {
            match server.serve(worker).await {
                Ok(running) => {
                    if let Err(e) = running.waiting().await {
                        debug!("Protocol service ended: session_id={}, error={}", session_id, e);
                    }
                }
                Err(e) => warn!("Protocol service failed: session_id={}, error={}", session_id, e),
            }
            close_weak(&weak);
        });

        *self.service.lock().unwrap_or_else(PoisonError::into_inner) = Some(service);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::TransportClosed)
        } else {
            Ok(())
        }
    }

    fn session_error(&self, e: impl Display) -> Error {
        if self.closed.load(Ordering::SeqCst) {
            Error::TransportClosed
        } else {
            Error::Transport(e.to_string())
        }
    }

    fn tag(&self, mut response: Response) -> Response {
        if let Ok(value) = HeaderValue::from_str(self.session_id.as_str()) {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        response
    }

    /// Handle a POST carrying one JSON-RPC message.
    ///
    /// Protocol-level rejections are returned as responses; `Err` means the
    /// session itself failed, including closing while the request waited.
    pub async fn post(&self, body: &[u8]) -> Result<Response> {
        self.ensure_open()?;

        let message = match parse_message(body) {
            Ok(message) => message,
            Err(rejection) => return Ok(self.tag(rejection)),
        };

        let response = if is_initialize(&message) {
            self.initialize(message).await?
        } else if !self.is_initialized() {
            error_response(
                StatusCode::BAD_REQUEST,
                SERVER_ERROR,
                "Bad Request: Server not initialized",
            )
        } else if matches!(message, ClientJsonRpcMessage::Request(_)) {
            self.request(message).await?
        } else {
            self.handle
                .push_message(message, None)
                .await
                .map_err(|e| self.session_error(e))?;
            StatusCode::ACCEPTED.into_response()
        };

        Ok(self.tag(response))
    }

    async fn initialize(&self, message: ClientJsonRpcMessage) -> Result<Response> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                INVALID_REQUEST,
                "Invalid Request: Server already initialized",
            ));
        }

        let reply = self
            .handle
            .initialize(message)
            .await
            .map_err(|e| self.session_error(e))?;
        Ok((StatusCode::OK, Json(reply)).into_response())
    }

    /// Forward a request and answer with its response as JSON.
    async fn request(&self, message: ClientJsonRpcMessage) -> Result<Response> {
        let mut receiver = self
            .handle
            .establish_request_wise_channel()
            .await
            .map_err(|e| self.session_error(e))?;
        self.handle
            .push_message(message, receiver.http_request_id)
            .await
            .map_err(|e| self.session_error(e))?;

        while let Some(event) = receiver.inner.recv().await {
            match &*event.message {
                ServerJsonRpcMessage::Response(_) | ServerJsonRpcMessage::Error(_) => {
                    return Ok((StatusCode::OK, Json(&*event.message)).into_response());
                }
                _ => debug!(
                    "Dropping in-request server message for session {}",
                    self.session_id
                ),
            }
        }

        // The worker dropped the channel without answering.
        Err(Error::TransportClosed)
    }

    /// Handle a GET opening the standalone server-to-client event stream.
    pub async fn get(&self, headers: &HeaderMap) -> Result<Response> {
        self.ensure_open()?;

        let accepts_sse = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|accept| accept.contains("text/event-stream"));
        if !accepts_sse {
            return Ok(self.tag(error_response(
                StatusCode::NOT_ACCEPTABLE,
                SERVER_ERROR,
                "Not Acceptable: Client must accept text/event-stream",
            )));
        }

        if self.stream_open.swap(true, Ordering::SeqCst) {
            return Ok(self.tag(error_response(
                StatusCode::CONFLICT,
                SERVER_ERROR,
                "Conflict: Only one SSE stream is allowed per session",
            )));
        }
        let guard = StreamGuard(Arc::clone(&self.stream_open));

        let receiver = self
            .handle
            .establish_common_channel()
            .await
            .map_err(|e| self.session_error(e))?;
        debug!("Standalone SSE stream opened: session_id={}", self.session_id);

        let events = ReceiverStream::new(receiver.inner).map(move |message| {
            let _open = &guard;
            sse_event(message)
        });
        Ok(self.tag(
            Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response(),
        ))
    }

    /// Handle a DELETE: close the session.
    pub fn delete(&self) -> Response {
        self.close();
        self.tag(StatusCode::OK.into_response())
    }

    /// Close the transport. Idempotent.
    ///
    /// Stops the protocol service, which ends pending requests and the event
    /// stream, then fires the close callback.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(service) = self
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            service.abort();
        }
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let handle = self.handle.clone();
            runtime.spawn(async move {
                let _ = handle.close().await;
            });
        }

        let callback = self
            .on_close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(&self.session_id);
        }

        debug!("Transport closed: session_id={}", self.session_id);
    }
}

fn sse_event(message: ServerSseMessage) -> std::result::Result<Event, axum::Error> {
    let event = Event::default()
        .event("message")
        .json_data(&*message.message)?;
    Ok(match message.event_id {
        Some(id) => event.id(id),
        None => event,
    })
}

fn close_weak(transport: &Weak<StreamableHttpTransport>) {
    if let Some(transport) = transport.upgrade() {
        transport.close();
    }
}

impl SessionTransport for StreamableHttpTransport {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        StreamableHttpTransport::close(self);
    }
}

impl Drop for StreamableHttpTransport {
    fn drop(&mut self) {
        if let Some(service) = self
            .service
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            service.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::service::{RequestContext, RoleServer};
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Clone)]
    struct EchoServer;

    impl ServerHandler for EchoServer {}

    /// Never answers a ping.
    #[derive(Clone)]
    struct StalledServer;

    impl ServerHandler for StalledServer {
        async fn ping(
            &self,
            _context: RequestContext<RoleServer>,
        ) -> std::result::Result<(), rmcp::ErrorData> {
            std::future::pending().await
        }
    }

    fn body(value: Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    fn initialize() -> Vec<u8> {
        body(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "1.0" }
            }
        }))
    }

    fn initialized() -> Vec<u8> {
        body(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
    }

    fn ping(id: u64) -> Vec<u8> {
        body(json!({ "jsonrpc": "2.0", "id": id, "method": "ping" }))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn ready<S: ServerHandler>(server: S) -> Arc<StreamableHttpTransport> {
        let transport = StreamableHttpTransport::new(SessionId::from("t1"));
        transport.connect(server).unwrap();

        let response = transport.post(&initialize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = transport.post(&initialized()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        transport
    }

    #[tokio::test]
    async fn test_initialize_then_ping() {
        let transport = StreamableHttpTransport::new(SessionId::from("t1"));
        transport.connect(EchoServer).unwrap();

        let response = transport.post(&initialize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SESSION_ID_HEADER], "t1");
        let reply = body_json(response).await;
        assert_eq!(reply["id"], 1);
        assert!(reply["result"]["protocolVersion"].is_string());

        let response = transport.post(&initialized()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = transport.post(&ping(2)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], 2);
    }

    #[tokio::test]
    async fn test_rejects_traffic_before_initialize() {
        let transport = StreamableHttpTransport::new(SessionId::from("t1"));
        transport.connect(EchoServer).unwrap();

        let response = transport.post(&ping(2)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_rejects_second_initialize() {
        let transport = ready(EchoServer).await;

        let response = transport.post(&initialize()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_rejects_invalid_payloads() {
        let transport = ready(EchoServer).await;

        let response = transport.post(&body(json!({ "hello": "world" }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[SESSION_ID_HEADER], "t1");
        assert_eq!(body_json(response).await["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_get_requires_event_stream() {
        let transport = ready(EchoServer).await;

        let response = transport.get(&HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
        let first = transport.get(&headers).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = transport.get(&headers).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        drop(first);
        let reopened = transport.get(&headers).await.unwrap();
        assert_eq!(reopened.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pending_request_fails_when_closed() {
        let transport = ready(StalledServer).await;

        let waiting = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.post(&ping(7)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        transport.close();

        let result = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();
        let Err(error) = result else {
            panic!("request should fail once the session closes");
        };
        assert!(matches!(error, Error::TransportClosed));

        let response = crate::transport::RouterError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_fires_callback_once() {
        let transport = ready(EchoServer).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        transport.on_close(move |id| {
            assert_eq!(id.as_str(), "t1");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let response = transport.delete();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SESSION_ID_HEADER], "t1");

        transport.close();
        SessionTransport::close(&*transport);

        assert!(transport.is_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            transport.post(&ping(3)).await,
            Err(Error::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let transport = StreamableHttpTransport::new(SessionId::from("t1"));
        transport.connect(EchoServer).unwrap();
        assert!(transport.connect(EchoServer).is_err());
    }
}
