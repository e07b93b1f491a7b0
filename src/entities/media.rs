use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::atom::{map_unique, Atom, AtomError, Lifecycle, SaveMode};

/// A catalogued media title. Ownership (which account may edit or delete a
/// title) is the recorded creator; the handler layer performs that
/// comparison, so the generic admin-or-owner check is not used here.
pub struct Media {
    id: Option<i32>,
    title: String,
    description: Option<String>,
    media_type: String,
    release_year: i32,
    age_restriction: i32,
    creator_id: Option<i32>,
    life: Lifecycle,
}

#[derive(FromRow)]
struct MediaRow {
    media_id: i32,
    title: String,
    description: Option<String>,
    #[sqlx(rename = "type")]
    media_type: String,
    release_year: i32,
    age_restriction: i32,
    creator_id: i32,
}

/// Lightweight projection for listing endpoints.
#[derive(Debug, Serialize, FromRow)]
pub struct MediaSummary {
    pub id: i32,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub release_year: i32,
    pub creator_id: i32,
}

impl Media {
    pub fn new() -> Self {
        Self {
            id: None,
            title: String::new(),
            description: None,
            media_type: "Movie".to_string(),
            release_year: 0,
            age_restriction: 0,
            creator_id: None,
            life: Lifecycle::new(),
        }
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn release_year(&self) -> i32 {
        self.release_year
    }

    pub fn age_restriction(&self) -> i32 {
        self.age_restriction
    }

    pub fn creator_id(&self) -> Option<i32> {
        self.creator_id
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        };
    }

    pub fn set_media_type(&mut self, media_type: &str) {
        self.media_type = media_type.to_string();
    }

    pub fn set_release_year(&mut self, release_year: i32) {
        self.release_year = release_year;
    }

    pub fn set_age_restriction(&mut self, age_restriction: i32) {
        self.age_restriction = age_restriction;
    }

    /// The creator is recorded at creation and never reassigned.
    pub fn set_creator(&mut self, creator_id: i32) -> Result<(), AtomError> {
        if !self.life.is_new() {
            return Err(AtomError::IllegalState("Cannot change creator."));
        }
        self.creator_id = Some(creator_id);
        Ok(())
    }

    pub async fn get(pool: &PgPool, id: i32) -> Result<Media, AtomError> {
        let row: Option<MediaRow> = sqlx::query_as(
            "SELECT media_id, title, description, type, release_year, age_restriction, creator_id
             FROM media_entries WHERE media_id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => Ok(Media::from_row(row)),
            None => Err(AtomError::NotFound(format!("Media '{}' not found.", id))),
        }
    }

    fn from_row(row: MediaRow) -> Media {
        Media {
            id: Some(row.media_id),
            title: row.title,
            description: row.description,
            media_type: row.media_type,
            release_year: row.release_year,
            age_restriction: row.age_restriction,
            creator_id: Some(row.creator_id),
            life: Lifecycle::loaded(),
        }
    }

    /// Summaries of all titles, ordered by name.
    pub async fn list_summaries(pool: &PgPool) -> Result<Vec<MediaSummary>, AtomError> {
        let rows = sqlx::query_as::<_, MediaSummary>(
            "SELECT media_id AS id, title, type AS media_type, release_year, creator_id
             FROM media_entries ORDER BY title ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    async fn title_taken(&self, pool: &PgPool) -> Result<bool, AtomError> {
        let (count,): (i64,) = match self.id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM media_entries
                     WHERE LOWER(title) = LOWER($1) AND media_id != $2",
                )
                .bind(&self.title)
                .bind(id)
                .fetch_one(pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM media_entries WHERE LOWER(title) = LOWER($1)")
                    .bind(&self.title)
                    .fetch_one(pool)
                    .await?
            }
        };
        Ok(count > 0)
    }

    async fn save_in(&mut self, pool: &PgPool, mode: SaveMode) -> Result<(), AtomError> {
        if self.title.trim().is_empty() {
            return Err(AtomError::Validation("Title cannot be empty.".to_string()));
        }
        if self.title_taken(pool).await? {
            return Err(AtomError::Conflict(format!(
                "A media entry with the title '{}' already exists.",
                self.title
            )));
        }

        match mode {
            SaveMode::Insert => {
                let creator_id = self.creator_id.ok_or_else(|| {
                    AtomError::Validation("Creator must be set before saving.".to_string())
                })?;

                let (media_id,): (i32,) = sqlx::query_as(
                    "INSERT INTO media_entries
                         (title, description, type, release_year, age_restriction, creator_id)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING media_id",
                )
                .bind(&self.title)
                .bind(&self.description)
                .bind(&self.media_type)
                .bind(self.release_year)
                .bind(self.age_restriction)
                .bind(creator_id)
                .fetch_one(pool)
                .await
                .map_err(|err| {
                    map_unique(
                        err,
                        format!("A media entry with the title '{}' already exists.", self.title),
                    )
                })?;

                self.id = Some(media_id);
            }
            SaveMode::Update => {
                let id = self
                    .id
                    .ok_or(AtomError::IllegalState("Media has no identifier."))?;

                let done = sqlx::query(
                    "UPDATE media_entries
                     SET title = $1, description = $2, type = $3,
                         release_year = $4, age_restriction = $5
                     WHERE media_id = $6",
                )
                .bind(&self.title)
                .bind(&self.description)
                .bind(&self.media_type)
                .bind(self.release_year)
                .bind(self.age_restriction)
                .bind(id)
                .execute(pool)
                .await
                .map_err(|err| {
                    map_unique(
                        err,
                        format!("A media entry with the title '{}' already exists.", self.title),
                    )
                })?;

                if done.rows_affected() == 0 {
                    return Err(AtomError::NotFound("Media no longer exists.".to_string()));
                }
            }
        }
        Ok(())
    }

    async fn delete_in(&self, pool: &PgPool) -> Result<(), AtomError> {
        let id = self
            .id
            .ok_or(AtomError::IllegalState("Media has no identifier."))?;

        let done = sqlx::query("DELETE FROM media_entries WHERE media_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if done.rows_affected() == 0 {
            tracing::warn!("media '{}' was already gone at delete", id);
        }
        Ok(())
    }

    async fn refresh_in(&mut self, pool: &PgPool) -> Result<(), AtomError> {
        let id = self
            .id
            .ok_or(AtomError::IllegalState("Media has no identifier."))?;

        let reloaded = Media::get(pool, id).await?;
        self.title = reloaded.title;
        self.description = reloaded.description;
        self.media_type = reloaded.media_type;
        self.release_year = reloaded.release_year;
        self.age_restriction = reloaded.age_restriction;
        self.creator_id = reloaded.creator_id;
        Ok(())
    }
}

impl Default for Media {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Atom for Media {
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
    use crate::atom::AtomState;

    #[test]
    fn creator_is_fixed_after_load() {
        let mut media = Media::new();
        media.set_creator(7).unwrap();
        assert_eq!(media.creator_id(), Some(7));

        let mut media = Media {
            life: Lifecycle::loaded(),
            ..Media::new()
        };
        assert_eq!(media.state(), AtomState::Clean);
        assert!(matches!(
            media.set_creator(7),
            Err(AtomError::IllegalState(_))
        ));
    }

    #[test]
    fn defaults_match_a_new_entry() {
        let media = Media::new();
        assert_eq!(media.media_type(), "Movie");
        assert_eq!(media.release_year(), 0);
        assert!(media.id().is_none());
    }
}
