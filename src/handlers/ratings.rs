use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;

use crate::atom::Atom;
use crate::dispatch::{Handler, RequestContext};
use crate::entities::Rating;
use crate::error::ApiError;
use crate::handlers::{int_field, segments, str_field};

/// Owns `/ratings`: creation, lookup and deletion.
pub struct RatingHandler {
    pool: PgPool,
}

impl RatingHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Handler for RatingHandler {
    fn name(&self) -> &'static str {
        "RatingHandler"
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &["/ratings"]
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let path = ctx.path.clone();
        let parts = segments(&path);

        match (&ctx.method, parts.as_slice()) {
            (&Method::POST, ["ratings"]) => {
                let mut rating = Rating::new();
                rating.initialize(
                    int_field(&ctx.body, "user_id", 0) as i32,
                    int_field(&ctx.body, "media_id", 0) as i32,
                )?;
                rating.set_score(int_field(&ctx.body, "score", 1) as i32)?;
                rating.set_comment(&str_field(&ctx.body, "comment"));
                rating.save(&self.pool).await?;

                ctx.respond(StatusCode::OK, json!({ "success": true, "id": rating.id() }));
                Ok(())
            }

            (&Method::GET, ["ratings", raw_id]) => {
                let Ok(id) = raw_id.parse::<i32>() else {
                    return Err(ApiError::bad_request("Invalid rating endpoint."));
                };

                let rating = Rating::get(&self.pool, id).await?;
                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "success": true,
                        "id": rating.id(),
                        "user_id": rating.user_id(),
                        "media_id": rating.media_id(),
                        "score": rating.score(),
                        "comment": rating.comment(),
                        "is_confirmed": rating.is_confirmed(),
                    }),
                );
                Ok(())
            }

            (&Method::DELETE, ["ratings", raw_id]) => {
                let Ok(id) = raw_id.parse::<i32>() else {
                    return Err(ApiError::bad_request("Invalid rating endpoint."));
                };

                let mut rating = Rating::get(&self.pool, id).await?;
                rating.delete(&self.pool).await?;

                ctx.respond(StatusCode::OK, json!({ "success": true }));
                Ok(())
            }

            _ => Err(ApiError::bad_request("Invalid rating endpoint.")),
        }
    }
}
