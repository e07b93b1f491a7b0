use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;

use crate::atom::Atom;
use crate::dispatch::{Handler, RequestContext};
use crate::entities::Genre;
use crate::error::ApiError;
use crate::handlers::{segments, str_field};

/// Owns `/genres`: creation, lookup by name and deletion.
pub struct GenreHandler {
    pool: PgPool,
}

impl GenreHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Handler for GenreHandler {
    fn name(&self) -> &'static str {
        "GenreHandler"
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &["/genres"]
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let path = ctx.path.clone();
        let parts = segments(&path);

        match (&ctx.method, parts.as_slice()) {
            (&Method::POST, ["genres"]) => {
                let mut genre = Genre::new();
                genre.set_name(&str_field(&ctx.body, "name"))?;
                genre.save(&self.pool).await?;

                ctx.respond(
                    StatusCode::OK,
                    json!({ "success": true, "message": "Genre created." }),
                );
                Ok(())
            }

            (&Method::GET, ["genres", name]) => {
                let genre = Genre::get(&self.pool, name).await?;
                ctx.respond(
                    StatusCode::OK,
                    json!({ "success": true, "name": genre.name(), "id": genre.id() }),
                );
                Ok(())
            }

            (&Method::DELETE, ["genres", name]) => {
                let mut genre = Genre::get(&self.pool, name).await?;
                genre.delete(&self.pool).await?;

                ctx.respond(
                    StatusCode::OK,
                    json!({ "success": true, "message": "Genre deleted." }),
                );
                Ok(())
            }

            _ => Err(ApiError::bad_request("Invalid genre endpoint.")),
        }
    }
}
