//! Ephemeral key/value cache with per-key expiry.
//!
//! Holds pending registrations and one-time verification codes. Entries are
//! gone once their TTL elapses; a `get` after expiry behaves exactly like a
//! `get` for a key that was never set.
//!
//! The production backend is an in-process `moka` cache whose expiry policy
//! reads the TTL stored with each entry, so two keys written together can
//! live for different lengths of time.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A zero TTL would make the entry invisible immediately.
    #[error("TTL must be greater than zero (key: {0})")]
    InvalidTtl(String),

    /// The backing store failed.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A cached value could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value store whose entries expire independently.
#[async_trait]
pub trait EphemeralCache: Send + Sync {
    /// Store `value` under `key` for `ttl`, replacing any previous value and
    /// resetting its expiry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the live value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Store a value as JSON.
///
/// # Errors
///
/// Returns `CacheError` if serialization or the backend fails.
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn EphemeralCache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let encoded = serde_json::to_string(value)?;
    cache.set(key, encoded, ttl).await
}

/// Fetch and decode a JSON value.
///
/// # Errors
///
/// Returns `CacheError` if the backend fails or the stored value does not
/// decode as `T`.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn EphemeralCache,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expiry policy that honours the TTL carried by each entry.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process [`EphemeralCache`] backed by `moka`.
#[derive(Clone)]
pub struct MokaCache {
    inner: Cache<String, Entry>,
}

impl MokaCache {
    /// Create a cache holding at most `max_capacity` entries.
    ///
    /// Every write is admitted; at capacity the least recently used entry
    /// is evicted to make room.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryTtl)
            .build();

        Self { inner }
    }
}

impl std::fmt::Debug for MokaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[async_trait]
impl EphemeralCache for MokaCache {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(key.to_owned()));
        }
        self.inner.insert(key.to_owned(), Entry { value, ttl }).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}
