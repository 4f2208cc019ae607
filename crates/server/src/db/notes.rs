//! Note repository.
//!
//! Every read filters on `deleted_at IS NULL` and on the owning user, so a
//! note that is soft-deleted or owned by someone else looks exactly like a
//! missing one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use notekeeper_core::{NoteId, UserId};

use super::{RepositoryError, page_bounds};
use crate::models::{Listing, NewNote, Note, NoteUpdate, PageRequest};

/// Owner-scoped note storage.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create(&self, note: NewNote) -> Result<Note, RepositoryError>;

    /// Get a live note owned by `owner`.
    async fn get(&self, owner: UserId, id: NoteId) -> Result<Option<Note>, RepositoryError>;

    /// List the owner's live notes, most recently updated first.
    async fn list(&self, owner: UserId, page: PageRequest)
    -> Result<Listing<Note>, RepositoryError>;

    /// Replace title and description. Returns `None` if no live note matched.
    async fn update(
        &self,
        owner: UserId,
        id: NoteId,
        update: NoteUpdate,
    ) -> Result<Option<Note>, RepositoryError>;

    /// Soft-delete a note. Returns `false` if no live note matched.
    async fn delete(&self, owner: UserId, id: NoteId) -> Result<bool, RepositoryError>;
}

#[derive(Debug, sqlx::FromRow)]
struct NoteRow {
    id: NoteId,
    user_id: UserId,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<NoteRow> for Note {
    fn from(r: NoteRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        }
    }
}

const NOTE_COLUMNS: &str = "id, user_id, title, description, created_at, updated_at, deleted_at";

/// `PostgreSQL` implementation of [`NoteStore`].
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: PgPool,
}

impl PgNoteRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteStore for PgNoteRepository {
    async fn create(&self, note: NewNote) -> Result<Note, RepositoryError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            r"
            INSERT INTO notes (user_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING {NOTE_COLUMNS}
            "
        ))
        .bind(note.user_id)
        .bind(&note.title)
        .bind(note.description.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get(&self, owner: UserId, id: NoteId) -> Result<Option<Note>, RepositoryError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Note::from))
    }

    async fn list(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Listing<Note>, RepositoryError> {
        let (limit, offset) = page_bounds(page)?;

        let rows = sqlx::query_as::<_, NoteRow>(&format!(
            r"
            SELECT {NOTE_COLUMNS} FROM notes
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY updated_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notes WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        Ok(Listing {
            items: rows.into_iter().map(Note::from).collect(),
            count,
        })
    }

    async fn update(
        &self,
        owner: UserId,
        id: NoteId,
        update: NoteUpdate,
    ) -> Result<Option<Note>, RepositoryError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            r"
            UPDATE notes
            SET title = $1, description = $2, updated_at = NOW()
            WHERE id = $3 AND user_id = $4 AND deleted_at IS NULL
            RETURNING {NOTE_COLUMNS}
            "
        ))
        .bind(&update.title)
        .bind(update.description.as_deref())
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Note::from))
    }

    async fn delete(&self, owner: UserId, id: NoteId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notes SET deleted_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
