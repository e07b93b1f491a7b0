use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;

use crate::atom::Atom;
use crate::dispatch::{Handler, RequestContext};
use crate::entities::User;
use crate::error::ApiError;
use crate::handlers::{segments, str_field};

/// Owns `/users`: registration, lookup, profile statistics, password
/// changes and account deletion.
pub struct UserHandler {
    pool: PgPool,
}

impl UserHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Handler for UserHandler {
    fn name(&self) -> &'static str {
        "UserHandler"
    }

    fn prefixes(&self) -> &'static [&'static str] {
        &["/users"]
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let path = ctx.path.clone();
        let parts = segments(&path);

        match (&ctx.method, parts.as_slice()) {
            // Register a user
            (&Method::POST, ["users"]) => {
                let username = str_field(&ctx.body, "username");
                let password = str_field(&ctx.body, "password");
                if password.is_empty() {
                    return Err(ApiError::validation("Password must not be empty."));
                }

                let mut user = User::new();
                user.set_user_name(&username)?;
                user.set_password(&password);
                user.save(&self.pool).await?;

                ctx.respond(
                    StatusCode::OK,
                    json!({ "success": true, "message": "User created." }),
                );
                Ok(())
            }

            (&Method::GET, ["users", username, "profile"]) => {
                let user = User::get(&self.pool, username).await?;
                let stats = User::statistics(&self.pool, user.user_name()).await?;

                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "success": true,
                        "username": user.user_name(),
                        "stats": stats,
                    }),
                );
                Ok(())
            }

            (&Method::GET, ["users", username]) => {
                let user = User::get(&self.pool, username).await?;
                ctx.respond(
                    StatusCode::OK,
                    json!({ "success": true, "username": user.user_name() }),
                );
                Ok(())
            }

            // Change a user's password; owner or admin only
            (&Method::PUT, ["users", username]) => {
                let Some(session) = ctx.session.clone() else {
                    return Err(ApiError::unauthorized("Authentication required."));
                };
                let password = str_field(&ctx.body, "password");
                if password.is_empty() {
                    return Err(ApiError::validation("Password must not be empty."));
                }

                let mut user = User::get(&self.pool, username).await?;
                user.begin_edit(&session)?;
                user.set_password(&password);
                user.save(&self.pool).await?;

                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "success": true,
                        "message": format!("User '{}' updated.", username),
                    }),
                );
                Ok(())
            }

            (&Method::DELETE, ["users", username]) => {
                let Some(session) = ctx.session.clone() else {
                    return Err(ApiError::unauthorized("Authentication required."));
                };

                let mut user = User::get(&self.pool, username).await?;
                user.begin_edit(&session)?;
                user.delete(&self.pool).await?;

                ctx.respond(
                    StatusCode::OK,
                    json!({
                        "success": true,
                        "message": format!("User '{}' deleted.", username),
                    }),
                );
                Ok(())
            }

            _ => Err(ApiError::bad_request("Invalid user endpoint.")),
        }
    }
}
