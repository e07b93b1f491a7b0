use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::atom::Atom;
use crate::dispatch::{Handler, RequestContext};
use crate::entities::{Media, User};
use crate::error::ApiError;
use crate::handlers::{int_field, segments, str_field};
use crate::session::Session;

/// Owns `/media`: listing, creation and per-title read/update/delete.
/// Updates and deletes are restricted to the recorded creator; that
/// comparison happens here rather than through the generic
/// admin-or-owner check.
pub struct MediaHandler {
    pool: PgPool,
}

impl MediaHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_creator(&self, media: &Media, session: &Session) -> Result<(), ApiError> {
        let current = User::id(&self.pool, &session.user_name).await?;
        if media.creator_id() != Some(current) {
            return Err(ApiError::forbidden("You can only edit your own entries."));
        }
        Ok(())
    }
}

fn detail(media: &Media) -> Value {
    json!({
        "success": true,
        "id": media.id(),
        "title": media.title(),
        "description": media.description(),
        "type": media.media_type(),
        "release_year": media.release_year(),
        "age_restriction": media.age_restriction(),
        "creator_id": media.creator_id(),
    })
}

#[async_trait]
impl Handler for MediaHandler {
    fn name(&self) -> &'static str {
        "MediaHandler"
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &["/media"]
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let path = ctx.path.clone();
        let parts = segments(&path);

        match parts.as_slice() {
            ["media"] => match ctx.method {
                Method::GET => {
                    let list = Media::list_summaries(&self.pool).await?;
                    ctx.respond(StatusCode::OK, json!({ "success": true, "data": list }));
                    Ok(())
                }
                Method::POST => {
                    let Some(session) = ctx.session.clone() else {
                        return Err(ApiError::unauthorized("Authentication required."));
                    };

                    let mut media = Media::new();
                    media.set_title(&str_field(&ctx.body, "title"));
                    media.set_description(&str_field(&ctx.body, "description"));
                    if let Some(media_type) = ctx.body.get("type").and_then(Value::as_str) {
                        media.set_media_type(media_type);
                    }
                    media.set_release_year(int_field(&ctx.body, "release_year", 0) as i32);
                    media.set_age_restriction(int_field(&ctx.body, "age_restriction", 0) as i32);

                    let creator = User::id(&self.pool, &session.user_name).await?;
                    media.set_creator(creator)?;
                    media.save(&self.pool).await?;

                    ctx.respond(
                        StatusCode::CREATED,
                        json!({
                            "success": true,
                            "id": media.id(),
                            "message": "Media entry created.",
                        }),
                    );
                    Ok(())
                }
                _ => Err(ApiError::method_not_allowed("Method not allowed.")),
            },

            ["media", raw_id] => {
                let Ok(id) = raw_id.parse::<i32>() else {
                    return Err(ApiError::not_found("Endpoint not found."));
                };

                match ctx.method {
                    Method::GET => {
                        let media = Media::get(&self.pool, id).await?;
                        ctx.respond(StatusCode::OK, detail(&media));
                        Ok(())
                    }
                    Method::PUT => {
                        let Some(session) = ctx.session.clone() else {
                            return Err(ApiError::unauthorized("Authentication required."));
                        };

                        let mut media = Media::get(&self.pool, id).await?;
                        self.ensure_creator(&media, &session).await?;

                        media.begin_edit(&session)?;
                        if let Some(title) = ctx.body.get("title").and_then(Value::as_str) {
                            media.set_title(title);
                        }
                        if let Some(description) =
                            ctx.body.get("description").and_then(Value::as_str)
                        {
                            media.set_description(description);
                        }
                        if let Some(media_type) = ctx.body.get("type").and_then(Value::as_str) {
                            media.set_media_type(media_type);
                        }
                        if let Some(year) = ctx.body.get("release_year").and_then(Value::as_i64) {
                            media.set_release_year(year as i32);
                        }
                        if let Some(age) = ctx.body.get("age_restriction").and_then(Value::as_i64)
                        {
                            media.set_age_restriction(age as i32);
                        }
                        media.save(&self.pool).await?;

                        ctx.respond(
                            StatusCode::OK,
                            json!({ "success": true, "message": "Media updated." }),
                        );
                        Ok(())
                    }
                    Method::DELETE => {
                        let Some(session) = ctx.session.clone() else {
                            return Err(ApiError::unauthorized("Authentication required."));
                        };

                        let mut media = Media::get(&self.pool, id).await?;
                        self.ensure_creator(&media, &session).await?;
                        media.delete(&self.pool).await?;

                        ctx.respond(
                            StatusCode::OK,
                            json!({ "success": true, "message": "Media deleted." }),
                        );
                        Ok(())
                    }
                    _ => Err(ApiError::method_not_allowed("Method not allowed.")),
                }
            }

            _ => Err(ApiError::not_found("Endpoint not found.")),
        }
    }
}
