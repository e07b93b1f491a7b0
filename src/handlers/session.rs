use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::dispatch::{Handler, RequestContext};
use crate::error::ApiError;
use crate::handlers::str_field;
use crate::session::SessionStore;

/// Owns `/login` and `/logout`: token issue and revocation.
pub struct SessionHandler {
    pool: PgPool,
    sessions: Arc<SessionStore>,
}

impl SessionHandler {
    pub fn new(pool: PgPool, sessions: Arc<SessionStore>) -> Self {
        Self { pool, sessions }
    }
}

#[async_trait]
impl Handler for SessionHandler {
    fn name(&self) -> &'static str {
        "SessionHandler"
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &["/login", "/logout"]
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let path = ctx.path.clone();

        match (&ctx.method, path.as_str()) {
            (&Method::POST, "/login") => {
                let username = str_field(&ctx.body, "username");
                let password = str_field(&ctx.body, "password");

                match self.sessions.create(&self.pool, &username, &password).await? {
                    Some(session) => {
                        ctx.respond(
                            StatusCode::OK,
                            json!({ "success": true, "token": session.token }),
                        );
                        Ok(())
                    }
                    None => {
                        tracing::warn!("invalid login attempt for '{}'", username);
                        Err(ApiError::unauthorized("Invalid username or password."))
                    }
                }
            }
            (&Method::POST, "/logout") => {
                let Some(session) = ctx.session.clone() else {
                    return Err(ApiError::unauthorized("Authentication required."));
                };
                self.sessions.revoke(&session.token).await;
                ctx.respond(
                    StatusCode::OK,
                    json!({ "success": true, "message": "Logged out." }),
                );
                Ok(())
            }
            _ => Err(ApiError::bad_request("Invalid session endpoint.")),
        }
    }
}
