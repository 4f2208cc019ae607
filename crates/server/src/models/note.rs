//! Note domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use notekeeper_core::{NoteId, UserId};

/// A personal note owned by exactly one user.
///
/// Deleting a note only stamps `deleted_at`; soft-deleted notes are invisible
/// to every read, list and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: NoteId,
    /// Owner of the note.
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
}

/// Replacement content for an existing note.
#[derive(Debug, Clone)]
pub struct NoteUpdate {
    pub title: String,
    pub description: Option<String>,
}
