//! Personal notes. Every route requires a bearer token and only ever sees
//! the caller's own notes; anyone else's note is reported as not found.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use notekeeper_core::NoteId;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{MessageResponse, NewNote, Note, NoteUpdate};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::users::page_from;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<Note>,
    pub count: i64,
}

fn not_found(id: NoteId) -> AppError {
    AppError::NotFound(format!("note {id}"))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<NoteRequest>,
) -> Result<(StatusCode, Json<Note>)> {
    let note = state
        .notes()
        .create(NewNote {
            user_id: user.user_id,
            title: validation::title(&req.title)?,
            description: validation::optional_text(req.description),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Note>> {
    let id = NoteId::new(id);
    let note = state
        .notes()
        .get(user.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(note))
}

/// List the caller's notes, most recently updated first.
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<ListNotesQuery>,
) -> Result<Json<NoteListResponse>> {
    let page = page_from(query.page, query.limit)?;
    let listing = state.notes().list(user.user_id, page).await?;

    Ok(Json(NoteListResponse {
        notes: listing.items,
        count: listing.count,
    }))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<NoteRequest>,
) -> Result<Json<Note>> {
    let id = NoteId::new(id);
    let update = NoteUpdate {
        title: validation::title(&req.title)?,
        description: validation::optional_text(req.description),
    };

    let note = state
        .notes()
        .update(user.user_id, id, update)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(note))
}

/// Soft-delete a note.
pub async fn destroy(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>> {
    let id = NoteId::new(id);
    if !state.notes().delete(user.user_id, id).await? {
        return Err(not_found(id));
    }

    Ok(Json(MessageResponse::new("Note deleted")))
}
