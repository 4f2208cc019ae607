//! In-memory collaborators for unit and router tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use notekeeper_core::{Email, NoteId, UserId};

use crate::cache::{CacheError, EphemeralCache};
use crate::db::{NoteStore, RepositoryError, UserListParams, UserStore};
use crate::models::{Listing, NewNote, NewUser, Note, NoteUpdate, PageRequest, User, UserUpdate};
use crate::services::notifier::{Notification, Notifier, NotifyError};

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    items
        .iter()
        .skip(offset)
        .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

/// Cache whose entries only expire when a test says so.
#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, (String, Duration)>>,
}

impl FakeCache {
    /// TTL the key was last written with, if it is present.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    /// Simulate the key's TTL elapsing.
    pub fn expire(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl EphemeralCache for FakeCache {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(key.to_owned()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), (value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// User store with a unique email index.
#[derive(Default)]
pub struct FakeUserStore {
    rows: Mutex<Vec<(User, Option<String>)>>,
    next_id: AtomicI64,
}

impl FakeUserStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for FakeUserStore {
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| &u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| &u.email == email)
            .and_then(|(u, hash)| hash.clone().map(|h| (u.clone(), h))))
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone()))
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let created = User {
            id: UserId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone_number: user.phone_number,
            image_url: user.image_url,
            created_at: Utc::now(),
        };
        rows.push((created.clone(), user.password_hash));
        Ok(created)
    }

    async fn list(&self, params: &UserListParams) -> Result<Listing<User>, RepositoryError> {
        let needle = params.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<User> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    u.first_name.to_lowercase().contains(n)
                        || u.last_name.to_lowercase().contains(n)
                        || u.email.as_str().contains(n)
                })
            })
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(Listing {
            count: i64::try_from(matching.len()).unwrap(),
            items: paginate(&matching, params.page),
        })
    }

    async fn update(
        &self,
        id: UserId,
        update: UserUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|(u, _)| u.id != id && u.email == update.email)
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        Ok(rows.iter_mut().find(|(u, _)| u.id == id).map(|(u, _)| {
            u.first_name = update.first_name;
            u.last_name = update.last_name;
            u.email = update.email;
            u.phone_number = update.phone_number;
            u.image_url = update.image_url;
            u.clone()
        }))
    }

    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|(u, _)| u.id != id);
        Ok(rows.len() < before)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Note store with soft delete.
#[derive(Default)]
pub struct FakeNoteStore {
    notes: Mutex<Vec<Note>>,
    next_id: AtomicI64,
}

impl FakeNoteStore {
    /// Every row, including soft-deleted ones.
    pub fn all(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }
}

#[async_trait]
impl NoteStore for FakeNoteStore {
    async fn create(&self, note: NewNote) -> Result<Note, RepositoryError> {
        let now = Utc::now();
        let created = Note {
            id: NoteId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            user_id: note.user_id,
            title: note.title,
            description: note.description,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.notes.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn get(&self, owner: UserId, id: NoteId) -> Result<Option<Note>, RepositoryError> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == id && n.user_id == owner && n.deleted_at.is_none())
            .cloned())
    }

    async fn list(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Listing<Note>, RepositoryError> {
        let mut live: Vec<Note> = self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == owner && n.deleted_at.is_none())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok(Listing {
            count: i64::try_from(live.len()).unwrap(),
            items: paginate(&live, page),
        })
    }

    async fn update(
        &self,
        owner: UserId,
        id: NoteId,
        update: NoteUpdate,
    ) -> Result<Option<Note>, RepositoryError> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter_mut()
            .find(|n| n.id == id && n.user_id == owner && n.deleted_at.is_none())
            .map(|n| {
                n.title = update.title;
                n.description = update.description;
                n.updated_at = Utc::now();
                n.clone()
            }))
    }

    async fn delete(&self, owner: UserId, id: NoteId) -> Result<bool, RepositoryError> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter_mut()
            .find(|n| n.id == id && n.user_id == owner && n.deleted_at.is_none())
            .map(|n| n.deleted_at = Some(Utc::now()))
            .is_some())
    }
}

/// Forwards every notification to a channel.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        // Receiver may already be dropped in tests that don't inspect mail
        let _ = self.tx.send(notification.clone());
        Ok(())
    }
}

/// Always fails, counting attempts.
#[derive(Default)]
pub struct FailingNotifier {
    calls: AtomicU32,
}

impl FailingNotifier {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::InvalidAddress("unreachable.invalid".to_owned()))
    }
}
