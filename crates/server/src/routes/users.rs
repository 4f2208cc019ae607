//! User management endpoints. Every route requires a bearer token.
//!
//! `POST /users` creates an account directly, skipping email verification.
//! Such accounts have no password until one is set through another path.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use notekeeper_core::{Email, UserId};

use crate::db::UserListParams;
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{MessageResponse, NewUser, PageRequest, User, UserUpdate};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use crate::validation;

/// Body for creating or replacing a user profile.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
}

/// Validated profile fields.
struct Profile {
    first_name: String,
    last_name: String,
    email: Email,
    phone_number: Option<String>,
    image_url: Option<String>,
}

impl UserRequest {
    fn validate(self) -> Result<Profile> {
        Ok(Profile {
            first_name: validation::name("first_name", &self.first_name)?,
            last_name: validation::name("last_name", &self.last_name)?,
            email: Email::parse(&self.email)?,
            phone_number: validation::optional_text(self.phone_number),
            image_url: validation::optional_text(self.image_url),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub count: i64,
}

/// Build a page request, rejecting out-of-range values.
pub(crate) fn page_from(page: Option<u32>, limit: Option<u32>) -> Result<PageRequest> {
    PageRequest::new(page, limit).ok_or_else(|| {
        AppError::Validation(format!(
            "page must be at least 1 and limit between 1 and {}",
            PageRequest::MAX_LIMIT
        ))
    })
}

fn ensure_self(current: &CurrentUser, id: UserId) -> Result<()> {
    if current.0.user_id == id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only modify your own account".to_string(),
        ))
    }
}

/// Create a user without verification.
pub async fn create(
    State(state): State<AppState>,
    _current: CurrentUser,
    ApiJson(req): ApiJson<UserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let profile = req.validate()?;

    let user = state
        .users()
        .create(NewUser {
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            password_hash: None,
            phone_number: profile.phone_number,
            image_url: profile.image_url,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User created directly");

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn show(
    State(state): State<AppState>,
    _current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<User>> {
    let user = state
        .users()
        .get_by_id(UserId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

    Ok(Json(user))
}

/// List users, newest first, optionally filtered by `search`.
pub async fn index(
    State(state): State<AppState>,
    _current: CurrentUser,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<UserListResponse>> {
    let params = UserListParams {
        page: page_from(query.page, query.limit)?,
        search: query.search,
    };

    let listing = state.users().list(&params).await?;

    Ok(Json(UserListResponse {
        users: listing.items,
        count: listing.count,
    }))
}

/// Replace the caller's own profile.
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UserRequest>,
) -> Result<Json<User>> {
    let id = UserId::new(id);
    ensure_self(&current, id)?;
    let profile = req.validate()?;

    let user = state
        .users()
        .update(
            id,
            UserUpdate {
                first_name: profile.first_name,
                last_name: profile.last_name,
                email: profile.email,
                phone_number: profile.phone_number,
                image_url: profile.image_url,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

    Ok(Json(user))
}

/// Delete the caller's own account and, by cascade, their notes.
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>> {
    let id = UserId::new(id);
    ensure_self(&current, id)?;

    if !state.users().delete(id).await? {
        return Err(AppError::NotFound(format!("user {id}")));
    }

    tracing::info!(user_id = %id, "User deleted");

    Ok(Json(MessageResponse::new("User deleted")))
}
