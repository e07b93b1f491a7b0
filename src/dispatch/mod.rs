//! Request dispatch pipeline.
//!
//! axum is only the listener: every request falls through a single fallback
//! into the [`Dispatcher`], which parses the body, resolves the caller's
//! session and offers the request to self-contained handlers in registration
//! order. The first handler to respond wins; unmatched requests get the
//! canonical 404 envelope.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::config;
use crate::error::ApiError;
use crate::session::{Session, SessionStore};

/// Per-request state offered to the handler chain.
///
/// `respond` is first-write-wins; a second call is a logged no-op, so no
/// request ever produces two responses.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub body: Value,
    pub session: Option<Session>,
    response: Option<(StatusCode, Value)>,
}

impl RequestContext {
    pub fn new(method: Method, path: &str, body: Value, session: Option<Session>) -> Self {
        Self {
            method,
            path: path.to_string(),
            body,
            session,
            response: None,
        }
    }

    pub fn respond(&mut self, status: StatusCode, body: Value) {
        if self.response.is_some() {
            tracing::warn!(
                "response already written for {} {}, ignoring second respond call",
                self.method,
                self.path
            );
            return;
        }
        self.response = Some((status, body));
    }

    pub fn responded(&self) -> bool {
        self.response.is_some()
    }

    fn take_response(&mut self) -> Option<(StatusCode, Value)> {
        self.response.take()
    }
}

/// A self-contained unit owning a subset of the request namespace.
///
/// A handler either fully resolves a request under one of its declared
/// prefixes (responding exactly once, or returning an error for the
/// dispatcher to translate) or leaves the context untouched. Sub-route
/// disambiguation is the handler's own job; there is no shared router.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Path prefixes this handler owns, used for registration-time conflict
    /// detection and dispatch-time matching.
    fn prefixes(&self) -> &'static [&'static str];

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError>;
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("handler '{second}' declares prefix '{prefix}' already owned by '{first}'")]
    DuplicatePrefix {
        prefix: &'static str,
        first: &'static str,
        second: &'static str,
    },
}

/// Segment-aware prefix ownership: `/users` owns `/users` and `/users/alice`
/// but not `/usersfoo`. The root prefix owns only the root path.
fn owns(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

pub struct Dispatcher {
    sessions: Arc<SessionStore>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            sessions,
            handlers: Vec::new(),
        }
    }

    /// Append a handler to the chain. Registration order is dispatch order
    /// and is fixed at startup. Duplicate prefix declarations are rejected
    /// here rather than discovered at runtime; nested prefixes are allowed
    /// but logged, since ordering then decides.
    pub fn register(&mut self, handler: Arc<dyn Handler>) -> Result<(), RegistrationError> {
        for &prefix in handler.prefixes() {
            for existing in &self.handlers {
                for &other in existing.prefixes() {
                    if other == prefix {
                        return Err(RegistrationError::DuplicatePrefix {
                            prefix,
                            first: existing.name(),
                            second: handler.name(),
                        });
                    }
                    if owns(other, prefix) || owns(prefix, other) {
                        tracing::warn!(
                            "prefix '{}' ({}) overlaps '{}' ({}); registration order decides",
                            prefix,
                            handler.name(),
                            other,
                            existing.name()
                        );
                    }
                }
            }
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Run one request through the chain and produce exactly one response.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: &[u8],
    ) -> (StatusCode, Value) {
        // A malformed body bypasses the chain entirely.
        let body = match parse_body(body) {
            Ok(value) => value,
            Err(err) => return (err.status_code(), err.envelope()),
        };

        // A missing or unresolvable credential is a null session, not an
        // error; endpoints that require one answer 401 themselves.
        let session = match bearer {
            Some(token) => self.sessions.resolve(token).await,
            None => None,
        };

        let mut ctx = RequestContext::new(method, path, body, session);

        for handler in &self.handlers {
            if !handler.prefixes().iter().any(|p| owns(p, &ctx.path)) {
                continue;
            }

            match handler.handle(&mut ctx).await {
                Ok(()) => {
                    if ctx.responded() {
                        tracing::info!("[{}] handled {} {}", handler.name(), ctx.method, ctx.path);
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "[{}] {} {} -> {}: {}",
                        handler.name(),
                        ctx.method,
                        ctx.path,
                        err.status_code(),
                        err.reason()
                    );
                    let (status, envelope) = (err.status_code(), err.envelope());
                    ctx.respond(status, envelope);
                    break;
                }
            }
        }

        match ctx.take_response() {
            Some(response) => response,
            None => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "reason": "Endpoint not found." }),
            ),
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Malformed JSON body."))
}

/// Shared axum state: the dispatcher built at startup.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// axum fallback: funnel every request into the dispatcher.
pub async fn entry(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let limit = config::config().server.max_request_size_bytes;
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::bad_request("Unable to read request body.").into_response(),
    };

    let bearer = bearer_token(&parts.headers);
    let (status, envelope) = state
        .dispatcher
        .dispatch(parts.method, parts.uri.path(), bearer.as_deref(), &bytes)
        .await;

    (status, Json(envelope)).into_response()
}

/// Extract a bearer credential if present; anything malformed reads as
/// "no credential".
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Echo {
        prefix: &'static [&'static str],
        name: &'static str,
    }

    #[async_trait]
    impl Handler for Echo {
        fn name(&self) -> &'static str {
            self.name
        }

        fn prefixes(&self) -> &'static [&'static str] {
            self.prefix
        }

        async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
            let body = json!({ "success": true, "handler": self.name });
            ctx.respond(StatusCode::OK, body);
            Ok(())
        }
    }

    struct Decline;

    #[async_trait]
    impl Handler for Decline {
        fn name(&self) -> &'static str {
            "decline"
        }

        fn prefixes(&self) -> &'static [&'static str] {
            &["/shared"]
        }

        async fn handle(&self, _ctx: &mut RequestContext) -> Result<(), ApiError> {
            // Leaves the context untouched so the next handler may act.
            Ok(())
        }
    }

    struct Faulty;

    #[async_trait]
    impl Handler for Faulty {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn prefixes(&self) -> &'static [&'static str] {
            &["/faulty"]
        }

        async fn handle(&self, _ctx: &mut RequestContext) -> Result<(), ApiError> {
            Err(ApiError::internal("boom"))
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(SessionStore::new(Duration::hours(1))))
    }

    #[tokio::test]
    async fn unmatched_requests_get_canonical_404() {
        let mut d = dispatcher();
        d.register(Arc::new(Echo { prefix: &["/echo"], name: "echo" }))
            .unwrap();

        let (status, body) = d.dispatch(Method::GET, "/nowhere", None, b"").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "Endpoint not found.");
    }

    #[tokio::test]
    async fn prefix_match_is_segment_aware() {
        let mut d = dispatcher();
        d.register(Arc::new(Echo { prefix: &["/echo"], name: "echo" }))
            .unwrap();

        let (status, _) = d.dispatch(Method::GET, "/echo/sub", None, b"").await;
        assert_eq!(status, StatusCode::OK);

        // "/echoes" is not owned by "/echo"
        let (status, _) = d.dispatch(Method::GET, "/echoes", None, b"").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn first_responding_handler_wins() {
        let mut d = dispatcher();
        d.register(Arc::new(Decline)).unwrap();
        d.register(Arc::new(Echo { prefix: &["/shared/sub"], name: "second" }))
            .unwrap();

        let (status, body) = d.dispatch(Method::GET, "/shared/sub", None, b"").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["handler"], "second");
    }

    #[tokio::test]
    async fn malformed_body_bypasses_handlers() {
        let mut d = dispatcher();
        d.register(Arc::new(Echo { prefix: &["/echo"], name: "echo" }))
            .unwrap();

        let (status, body) = d.dispatch(Method::POST, "/echo", None, b"{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn handler_errors_become_envelopes() {
        let mut d = dispatcher();
        d.register(Arc::new(Faulty)).unwrap();

        let (status, body) = d.dispatch(Method::GET, "/faulty", None, b"").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "boom");
    }

    #[tokio::test]
    async fn duplicate_prefixes_are_rejected_at_registration() {
        let mut d = dispatcher();
        d.register(Arc::new(Echo { prefix: &["/echo"], name: "first" }))
            .unwrap();
        let err = d
            .register(Arc::new(Echo { prefix: &["/echo"], name: "second" }))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicatePrefix { .. }));
    }

    #[test]
    fn respond_is_first_write_wins() {
        let mut ctx = RequestContext::new(Method::GET, "/x", Value::Null, None);
        ctx.respond(StatusCode::OK, json!({ "first": true }));
        ctx.respond(StatusCode::INTERNAL_SERVER_ERROR, json!({ "second": true }));

        let (status, body) = ctx.take_response().unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["first"], true);
    }
}
