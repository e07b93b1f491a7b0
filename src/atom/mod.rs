//! Generic edit lifecycle shared by every persistent entity.
//!
//! Each entity owns a [`Lifecycle`] value and implements [`Atom`] on top of
//! it. The lifecycle gates mutation behind an attributed edit: `begin_edit`
//! copies the caller's identity out of the session, and every terminal
//! operation (`save`, `delete`, `refresh`) clears that attribution on every
//! exit path, success or failure.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::session::Session;

/// Domain-layer failure taxonomy. Translated to HTTP statuses by
/// `error::ApiError`.
#[derive(Debug, Error)]
pub enum AtomError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    IllegalState(&'static str),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn pg_error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map a unique-index violation onto `Conflict`; everything else stays a
/// storage error.
pub fn map_unique(err: sqlx::Error, reason: impl Into<String>) -> AtomError {
    if pg_error_code(&err).as_deref() == Some(UNIQUE_VIOLATION) {
        AtomError::Conflict(reason.into())
    } else {
        AtomError::Storage(err)
    }
}

/// Map a foreign-key violation onto `Conflict` (delete restricted by related
/// rows); everything else stays a storage error.
pub fn map_restrict(err: sqlx::Error, reason: impl Into<String>) -> AtomError {
    if pg_error_code(&err).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
        AtomError::Conflict(reason.into())
    } else {
        AtomError::Storage(err)
    }
}

/// Map a foreign-key violation onto `NotFound` (insert referencing a row
/// that is absent); everything else stays a storage error.
pub fn map_missing_reference(err: sqlx::Error, reason: impl Into<String>) -> AtomError {
    if pg_error_code(&err).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
        AtomError::NotFound(reason.into())
    } else {
        AtomError::Storage(err)
    }
}

/// Lifecycle position of an entity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomState {
    New,
    Clean,
    Editing,
    Deleted,
}

/// Identity attributed to an in-flight edit. A by-value copy taken from the
/// session, never a back-reference into the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    pub user_name: String,
    pub is_admin: bool,
}

impl From<&Session> for Editor {
    fn from(session: &Session) -> Self {
        Self {
            user_name: session.user_name.clone(),
            is_admin: session.is_admin,
        }
    }
}

/// Which statement a `save` will issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Insert,
    Update,
}

/// The state machine itself. Entities call the `*_mode`/`allow_*` guards at
/// the top of each operation and one of the `settle_*` bookkeepers at the
/// bottom.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomState,
    editor: Option<Editor>,
}

impl Lifecycle {
    /// Lifecycle for an instance constructed in memory.
    pub fn new() -> Self {
        Self {
            state: AtomState::New,
            editor: None,
        }
    }

    /// Lifecycle for an instance just loaded from the store.
    pub fn loaded() -> Self {
        Self {
            state: AtomState::Clean,
            editor: None,
        }
    }

    pub fn state(&self) -> AtomState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == AtomState::New
    }

    pub fn editor(&self) -> Option<&Editor> {
        self.editor.as_ref()
    }

    /// Clean -> Editing, attributing the edit to the session's identity.
    pub fn begin_edit(&mut self, session: &Session) -> Result<(), AtomError> {
        match self.state {
            AtomState::Clean => {
                self.editor = Some(Editor::from(session));
                self.state = AtomState::Editing;
                Ok(())
            }
            AtomState::New => Err(AtomError::IllegalState(
                "Cannot begin editing an unsaved instance.",
            )),
            AtomState::Editing => Err(AtomError::IllegalState("An edit is already in progress.")),
            AtomState::Deleted => Err(AtomError::IllegalState(
                "Cannot begin editing a deleted instance.",
            )),
        }
    }

    /// New saves insert, Editing saves update; anything else is a contract
    /// violation.
    pub fn save_mode(&self) -> Result<SaveMode, AtomError> {
        match self.state {
            AtomState::New => Ok(SaveMode::Insert),
            AtomState::Editing => Ok(SaveMode::Update),
            AtomState::Clean => Err(AtomError::IllegalState("Cannot save without an active edit.")),
            AtomState::Deleted => Err(AtomError::IllegalState("Cannot save a deleted instance.")),
        }
    }

    /// Delete is legal from Clean or Editing.
    pub fn allow_delete(&self) -> Result<(), AtomError> {
        match self.state {
            AtomState::Clean | AtomState::Editing => Ok(()),
            AtomState::New => Err(AtomError::IllegalState("Cannot delete an unsaved instance.")),
            AtomState::Deleted => Err(AtomError::IllegalState("Instance is already deleted.")),
        }
    }

    /// Returns whether a reload is needed: `false` for New (no-op), `true`
    /// for Clean/Editing.
    pub fn refresh_mode(&self) -> Result<bool, AtomError> {
        match self.state {
            AtomState::New => Ok(false),
            AtomState::Clean | AtomState::Editing => Ok(true),
            AtomState::Deleted => Err(AtomError::IllegalState(
                "Cannot refresh a deleted instance.",
            )),
        }
    }

    /// Passes when the attributed editor is `owner` or carries the admin
    /// role.
    pub fn ensure_admin_or_owner(&self, owner: &str) -> Result<(), AtomError> {
        match self.editor {
            Some(ref editor) if editor.is_admin || editor.user_name == owner => Ok(()),
            Some(_) => Err(AtomError::Forbidden(format!(
                "Not permitted to modify '{}'.",
                owner
            ))),
            None => Err(AtomError::Forbidden(
                "No editing session attributed.".to_string(),
            )),
        }
    }

    /// Bookkeeping after `save`. A failed insert leaves the instance New so
    /// the caller can fix and retry; a failed update ends the edit.
    pub fn settle_save(&mut self, mode: SaveMode, succeeded: bool) {
        self.editor = None;
        self.state = match (succeeded, mode) {
            (true, _) => AtomState::Clean,
            (false, SaveMode::Insert) => AtomState::New,
            (false, SaveMode::Update) => AtomState::Clean,
        };
    }

    /// Bookkeeping after `delete`.
    pub fn settle_delete(&mut self, succeeded: bool) {
        self.editor = None;
        self.state = if succeeded {
            AtomState::Deleted
        } else {
            AtomState::Clean
        };
    }

    /// Bookkeeping after `refresh`: uncommitted edits are discarded.
    pub fn settle_refresh(&mut self) {
        self.editor = None;
        self.state = AtomState::Clean;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability contract every persistent entity implements.
///
/// Entities never hold a connection; a pool handle is passed per logical
/// call and released on every exit path.
#[async_trait]
pub trait Atom {
    fn lifecycle(&self) -> &Lifecycle;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    fn state(&self) -> AtomState {
        self.lifecycle().state()
    }

    /// Clean -> Editing, attributed to `session`.
    fn begin_edit(&mut self, session: &Session) -> Result<(), AtomError> {
        self.lifecycle_mut().begin_edit(session)
    }

    /// Insert (New) or update (Editing), then Clean.
    async fn save(&mut self, pool: &PgPool) -> Result<(), AtomError>;

    /// Remove the persisted row; tolerant of rows that already vanished.
    async fn delete(&mut self, pool: &PgPool) -> Result<(), AtomError>;

    /// Reload from the store, discarding uncommitted in-memory edits.
    async fn refresh(&mut self, pool: &PgPool) -> Result<(), AtomError>;
}
