use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::atom::{map_restrict, map_unique, Atom, AtomError, Lifecycle, SaveMode};

/// A registered account. The password digest is write-only: set before a
/// save, cleared afterwards, never loaded back from the store.
pub struct User {
    user_name: String,
    password_hash: Option<String>,
    life: Lifecycle,
}

/// Rating statistics shown on the profile endpoint.
#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total_ratings: i64,
    pub average_score: f64,
}

/// Salted digest used for credential storage and verification.
pub(crate) fn password_digest(user_name: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_name.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a password against the stored digest. `Some(is_admin)` on a match;
/// `None` for an unknown user and a wrong password alike.
pub async fn verify_credentials(
    pool: &PgPool,
    user_name: &str,
    password: &str,
) -> Result<Option<bool>, AtomError> {
    let row: Option<(String, bool)> =
        sqlx::query_as("SELECT password_hash, is_admin FROM users WHERE username = $1")
            .bind(user_name)
            .fetch_optional(pool)
            .await?;

    Ok(match row {
        Some((hash, is_admin)) if hash == password_digest(user_name, password) => Some(is_admin),
        _ => None,
    })
}

impl User {
    pub fn new() -> Self {
        Self {
            user_name: String::new(),
            password_hash: None,
            life: Lifecycle::new(),
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// The name is the natural key; it is fixed once the row exists.
    pub fn set_user_name(&mut self, user_name: &str) -> Result<(), AtomError> {
        if !self.life.is_new() {
            return Err(AtomError::IllegalState("User name cannot be changed."));
        }
        if user_name.trim().is_empty() {
            return Err(AtomError::Validation("User name must not be empty.".to_string()));
        }
        self.user_name = user_name.to_string();
        Ok(())
    }

    pub fn set_password(&mut self, password: &str) {
        self.password_hash = Some(password_digest(&self.user_name, password));
    }

    pub async fn get(pool: &PgPool, user_name: &str) -> Result<User, AtomError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT username FROM users WHERE username = $1")
                .bind(user_name)
                .fetch_optional(pool)
                .await?;

        match row {
            Some((user_name,)) => Ok(User {
                user_name,
                password_hash: None,
                life: Lifecycle::loaded(),
            }),
            None => Err(AtomError::NotFound(format!("User '{}' not found.", user_name))),
        }
    }

    pub async fn id(pool: &PgPool, user_name: &str) -> Result<i32, AtomError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE username = $1")
                .bind(user_name)
                .fetch_optional(pool)
                .await?;

        row.map(|(id,)| id)
            .ok_or_else(|| AtomError::NotFound(format!("User '{}' not found.", user_name)))
    }

    pub async fn statistics(pool: &PgPool, user_name: &str) -> Result<UserStats, AtomError> {
        let user_id = Self::id(pool, user_name).await?;

        let (total_ratings, average_score): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(AVG(score), 0)::float8 FROM ratings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(UserStats {
            total_ratings,
            average_score: (average_score * 100.0).round() / 100.0,
        })
    }

    async fn save_in(&mut self, pool: &PgPool, mode: SaveMode) -> Result<(), AtomError> {
        if let SaveMode::Update = mode {
            self.life.ensure_admin_or_owner(&self.user_name)?;
        }

        if self.user_name.trim().is_empty() {
            return Err(AtomError::Validation("Username cannot be empty.".to_string()));
        }
        let hash = self
            .password_hash
            .clone()
            .ok_or_else(|| AtomError::Validation("Password must be set before saving.".to_string()))?;

        match mode {
            SaveMode::Insert => {
                sqlx::query("INSERT INTO users (username, password_hash) VALUES ($1, $2)")
                    .bind(&self.user_name)
                    .bind(&hash)
                    .execute(pool)
                    .await
                    .map_err(|err| {
                        map_unique(err, format!("Username '{}' already exists.", self.user_name))
                    })?;
            }
            SaveMode::Update => {
                let done = sqlx::query("UPDATE users SET password_hash = $1 WHERE username = $2")
                    .bind(&hash)
                    .bind(&self.user_name)
                    .execute(pool)
                    .await?;
                if done.rows_affected() == 0 {
                    return Err(AtomError::NotFound("User no longer exists.".to_string()));
                }
            }
        }

        self.password_hash = None;
        Ok(())
    }

    async fn delete_in(&self, pool: &PgPool) -> Result<(), AtomError> {
        self.life.ensure_admin_or_owner(&self.user_name)?;

        let done = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(&self.user_name)
            .execute(pool)
            .await
            .map_err(|err| {
                map_restrict(
                    err,
                    format!(
                        "Cannot delete user '{}' because they have related data.",
                        self.user_name
                    ),
                )
            })?;

        if done.rows_affected() == 0 {
            tracing::warn!("user '{}' was already gone at delete", self.user_name);
        }
        Ok(())
    }

    async fn refresh_in(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT username FROM users WHERE username = $1")
                .bind(&self.user_name)
                .fetch_optional(pool)
                .await?;

        match row {
            Some((user_name,)) => {
                self.user_name = user_name;
                self.password_hash = None;
                Ok(())
            }
            None => Err(AtomError::NotFound(format!(
                "User '{}' no longer exists.",
                self.user_name
            ))),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Atom for User {
    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.life
    }

    async fn save(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        let mode = self.life.save_mode()?;
        let result = self.save_in(pool, mode).await;
        self.life.settle_save(mode, result.is_ok());
        result
    }

    async fn delete(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        self.life.allow_delete()?;
        let result = self.delete_in(pool).await;
        self.life.settle_delete(result.is_ok());
        result
    }

    async fn refresh(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        if !self.life.refresh_mode()? {
            return Ok(());
        }
        let result = self.refresh_in(pool).await;
        self.life.settle_refresh();
        result
    }
}
