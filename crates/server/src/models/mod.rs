//! Domain models for the notes service.
//!
//! These types represent validated domain objects separate from database row
//! types (see `crate::db`) and from request bodies (see `crate::routes`).

pub mod auth;
pub mod note;
pub mod page;
pub mod user;

pub use auth::{
    AuthPayload, AuthResponse, LoginRequest, MessageResponse, PendingRegistration,
    RegisterRequest, VerifyRequest,
};
pub use note::{NewNote, Note, NoteUpdate};
pub use page::{Listing, PageRequest};
pub use user::{NewUser, User, UserUpdate};
