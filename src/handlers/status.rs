use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;

use crate::database;
use crate::dispatch::{Handler, RequestContext};
use crate::error::ApiError;

/// Owns `/` and `/health`: service info and liveness.
pub struct StatusHandler {
    pool: PgPool,
}

impl StatusHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Handler for StatusHandler {
    fn name(&self) -> &'static str {
        "StatusHandler"
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &["/", "/health"]
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let path = ctx.path.clone();

        match (&ctx.method, path.as_str()) {
            (&Method::GET, "/") => {
                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "success": true,
                        "data": {
                            "name": "Medialist API",
                            "version": env!("CARGO_PKG_VERSION"),
                            "description": "Self-hosted REST backend for a media catalogue",
                            "endpoints": {
                                "login": "POST /login, POST /logout",
                                "users": "/users, /users/:name, /users/:name/profile",
                                "media": "/media, /media/:id",
                                "genres": "/genres, /genres/:name",
                                "ratings": "/ratings, /ratings/:id",
                            }
                        }
                    }),
                );
                Ok(())
            }
            (&Method::GET, "/health") => {
                let now = chrono::Utc::now();
                match database::health_check(&self.pool).await {
                    Ok(()) => ctx.respond(
                        StatusCode::OK,
                        json!({
                            "success": true,
                            "data": { "status": "ok", "timestamp": now, "database": "ok" }
                        }),
                    ),
                    Err(err) => {
                        tracing::warn!("health check failed: {}", err);
                        ctx.respond(
                            StatusCode::SERVICE_UNAVAILABLE,
                            json!({
                                "success": false,
                                "reason": "Database unavailable.",
                                "data": { "status": "degraded", "timestamp": now }
                            }),
                        )
                    }
                }
                Ok(())
            }
            _ => Err(ApiError::method_not_allowed("Method not allowed.")),
        }
    }
}
