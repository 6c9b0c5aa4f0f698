//! # User Cache
//!
//! The DAS user directory is fetched once and shared by all reconciles until
//! it expires or a call that may add a user invalidates it.

use super::types::Reconciler;
use crate::provider::das::User;
use crate::provider::ClientResult;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Single-entry cache with an optional time-to-live
///
/// Without a TTL the entry never decays and only [`ExpiringCache::invalidate_all`]
/// clears it.
#[derive(Debug)]
pub struct ExpiringCache<T> {
    ttl: Option<Duration>,
    entry: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> ExpiringCache<T> {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Option<T> {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        match entry.as_ref() {
            Some((stored_at, _)) if self.ttl.is_some_and(|ttl| stored_at.elapsed() >= ttl) => {
                *entry = None;
                None
            }
            Some((_, value)) => Some(value.clone()),
            None => None,
        }
    }

    pub fn set(&self, value: T) {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        *entry = Some((Instant::now(), value));
    }

    pub fn invalidate_all(&self) {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        *entry = None;
    }
}

pub type UserCache = ExpiringCache<Vec<User>>;

impl Reconciler {
    /// The user directory, served from cache when possible
    pub(crate) async fn users(&self) -> ClientResult<Vec<User>> {
        if let Some(users) = self.user_cache.get() {
            return Ok(users);
        }
        debug!("User cache empty, fetching user directory");
        let users = self.das.get_users().await?;
        self.user_cache.set(users.clone());
        Ok(users)
    }
}
