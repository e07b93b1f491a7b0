use async_trait::async_trait;
use sqlx::PgPool;

use crate::atom::{map_unique, Atom, AtomError, Lifecycle, SaveMode};

/// A genre label. Looked up by name, keyed by a surrogate id.
pub struct Genre {
    id: Option<i32>,
    name: String,
    life: Lifecycle,
}

impl Genre {
    pub fn new() -> Self {
        Self {
            id: None,
            name: String::new(),
            life: Lifecycle::new(),
        }
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), AtomError> {
        if name.trim().is_empty() {
            return Err(AtomError::Validation("Genre name cannot be empty.".to_string()));
        }
        self.name = name.to_string();
        Ok(())
    }

    pub async fn get(pool: &PgPool, name: &str) -> Result<Genre, AtomError> {
        let row: Option<(i32, String)> =
            sqlx::query_as("SELECT genre_id, name FROM genres WHERE name = $1")
                .bind(name)
                .fetch_optional(pool)
                .await?;

        match row {
            Some((id, name)) => Ok(Genre {
                id: Some(id),
                name,
                life: Lifecycle::loaded(),
            }),
            None => Err(AtomError::NotFound(format!("Genre '{}' not found.", name))),
        }
    }

    async fn save_in(&mut self, pool: &PgPool, mode: SaveMode) -> Result<(), AtomError> {
        if self.name.trim().is_empty() {
            return Err(AtomError::Validation("Name cannot be empty.".to_string()));
        }

        match mode {
            SaveMode::Insert => {
                let (genre_id,): (i32,) =
                    sqlx::query_as("INSERT INTO genres (name) VALUES ($1) RETURNING genre_id")
                        .bind(&self.name)
                        .fetch_one(pool)
                        .await
                        .map_err(|err| {
                            map_unique(err, format!("Genre '{}' already exists.", self.name))
                        })?;
                self.id = Some(genre_id);
            }
            SaveMode::Update => {
                let id = self
                    .id
                    .ok_or(AtomError::IllegalState("Genre has no identifier."))?;

                let done = sqlx::query("UPDATE genres SET name = $1 WHERE genre_id = $2")
                    .bind(&self.name)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|err| {
                        map_unique(err, format!("Genre '{}' already exists.", self.name))
                    })?;

                if done.rows_affected() == 0 {
                    return Err(AtomError::NotFound("Genre no longer exists.".to_string()));
                }
            }
        }
        Ok(())
    }

    async fn delete_in(&self, pool: &PgPool) -> Result<(), AtomError> {
        let id = self
            .id
            .ok_or(AtomError::IllegalState("Genre has no identifier."))?;

        let done = sqlx::query("DELETE FROM genres WHERE genre_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if done.rows_affected() == 0 {
            tracing::warn!("genre '{}' was already gone at delete", self.name);
        }
        Ok(())
    }

    async fn refresh_in(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        let id = self
            .id
            .ok_or(AtomError::IllegalState("Genre has no identifier."))?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM genres WHERE genre_id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        match row {
            Some((name,)) => {
                self.name = name;
                Ok(())
            }
            None => Err(AtomError::NotFound(format!(
                "Genre '{}' no longer exists.",
                self.name
            ))),
        }
    }
}

impl Default for Genre {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Atom for Genre {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_must_not_be_blank() {
        let mut genre = Genre::new();
        assert!(matches!(genre.set_name(""), Err(AtomError::Validation(_))));
        assert!(matches!(genre.set_name("  "), Err(AtomError::Validation(_))));
        genre.set_name("Horror").unwrap();
        assert_eq!(genre.name(), "Horror");
    }
}
