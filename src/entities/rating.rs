use async_trait::async_trait;
use sqlx::PgPool;

use crate::atom::{map_missing_reference, Atom, AtomError, Lifecycle, SaveMode};

/// A score a user gave a media title.
pub struct Rating {
    id: Option<i32>,
    user_id: i32,
    media_id: i32,
    score: i32,
    comment: Option<String>,
    is_confirmed: bool,
    life: Lifecycle,
}

impl Rating {
    pub fn new() -> Self {
        Self {
            id: None,
            user_id: 0,
            media_id: 0,
            score: 1,
            comment: None,
            is_confirmed: false,
            life: Lifecycle::new(),
        }
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn media_id(&self) -> i32 {
        self.media_id
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }

    pub fn is_confirmed(&self) -> bool {
        self.is_confirmed
    }

    /// Link the rating to its user and media. Fixed once saved.
    pub fn initialize(&mut self, user_id: i32, media_id: i32) -> Result<(), AtomError> {
        if !self.life.is_new() {
            return Err(AtomError::IllegalState("Cannot change linking."));
        }
        self.user_id = user_id;
        self.media_id = media_id;
        Ok(())
    }

    pub fn set_score(&mut self, score: i32) -> Result<(), AtomError> {
        if !(1..=5).contains(&score) {
            return Err(AtomError::Validation("Score must be 1-5.".to_string()));
        }
        self.score = score;
        Ok(())
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = if comment.is_empty() {
            None
        } else {
            Some(comment.to_string())
        };
    }

    pub async fn get(pool: &PgPool, id: i32) -> Result<Rating, AtomError> {
        let row: Option<(i32, i32, i32, i32, Option<String>, bool)> = sqlx::query_as(
            "SELECT rating_id, user_id, media_id, score, comment, is_confirmed
             FROM ratings WHERE rating_id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some((id, user_id, media_id, score, comment, is_confirmed)) => Ok(Rating {
                id: Some(id),
                user_id,
                media_id,
                score,
                comment,
                is_confirmed,
                life: Lifecycle::loaded(),
            }),
            None => Err(AtomError::NotFound("Rating not found.".to_string())),
        }
    }

    async fn save_in(&mut self, pool: &PgPool, mode: SaveMode) -> Result<(), AtomError> {
        match mode {
            SaveMode::Insert => {
                let (rating_id,): (i32,) = sqlx::query_as(
                    "INSERT INTO ratings (user_id, media_id, score, comment)
                     VALUES ($1, $2, $3, $4) RETURNING rating_id",
                )
                .bind(self.user_id)
                .bind(self.media_id)
                .bind(self.score)
                .bind(&self.comment)
                .fetch_one(pool)
                .await
                .map_err(|err| {
                    map_missing_reference(err, "Referenced user or media does not exist.")
                })?;

                self.id = Some(rating_id);
            }
            SaveMode::Update => {
                let id = self
                    .id
                    .ok_or(AtomError::IllegalState("Rating has no identifier."))?;

                let done =
                    sqlx::query("UPDATE ratings SET score = $1, comment = $2 WHERE rating_id = $3")
                        .bind(self.score)
                        .bind(&self.comment)
                        .bind(id)
                        .execute(pool)
                        .await?;

                if done.rows_affected() == 0 {
                    return Err(AtomError::NotFound("Rating no longer exists.".to_string()));
                }
            }
        }
        Ok(())
    }

    async fn delete_in(&self, pool: &PgPool) -> Result<(), AtomError> {
        let id = self
            .id
            .ok_or(AtomError::IllegalState("Rating has no identifier."))?;

        let done = sqlx::query("DELETE FROM ratings WHERE rating_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if done.rows_affected() == 0 {
            tracing::warn!("rating '{}' was already gone at delete", id);
        }
        Ok(())
    }

    async fn refresh_in(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        let id = self
            .id
            .ok_or(AtomError::IllegalState("Rating has no identifier."))?;

        let reloaded = Rating::get(pool, id).await?;
        self.user_id = reloaded.user_id;
        self.media_id = reloaded.media_id;
        self.score = reloaded.score;
        self.comment = reloaded.comment;
        self.is_confirmed = reloaded.is_confirmed;
        Ok(())
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Atom for Rating {
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
    fn score_bounds_are_enforced() {
        let mut rating = Rating::new();
        assert!(matches!(rating.set_score(0), Err(AtomError::Validation(_))));
        assert!(matches!(rating.set_score(6), Err(AtomError::Validation(_))));
        rating.set_score(5).unwrap();
        assert_eq!(rating.score(), 5);
    }

    #[test]
    fn linking_is_fixed_after_save() {
        let mut rating = Rating::new();
        rating.initialize(1, 2).unwrap();
        rating.life.settle_save(SaveMode::Insert, true);
        assert!(matches!(
            rating.initialize(3, 4),
            Err(AtomError::IllegalState(_))
        ));
    }
}
