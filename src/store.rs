//! Document-store persistence targets.
//!
//! Two writes leave this subsystem: the registration token merged into the
//! user's profile, and foreground notifications appended to the user's log.
//! Both are stamped with the store's own clock, never the device's.
//!
//! [`MemoryStore`] keeps everything in process; [`crate::firestore`] writes to
//! the hosted document database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::router::NormalizedNotification;
use crate::token::RegistrationToken;

/// Profile documents keyed by uid.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Merge `{ fcmToken, lastTokenUpdate: <server time> }` into the profile.
    async fn update_push_token(&self, uid: &str, token: &RegistrationToken) -> Result<()>;
}

/// Append-only per-user notification logs.
#[async_trait]
pub trait NotificationLog: Send + Sync {
    /// Append an unread entry stamped with server time. Returns the entry id.
    async fn append(&self, uid: &str, notification: &NormalizedNotification) -> Result<String>;
}

/// Token fields of a profile document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileTokens {
    /// Last registration token written.
    pub fcm_token: Option<String>,
    /// When the token was written.
    pub last_token_update: Option<DateTime<Utc>>,
}

/// A notification log entry as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNotification {
    /// Entry id.
    pub id: String,
    /// The normalized record.
    #[serde(flatten)]
    pub notification: NormalizedNotification,
    /// Server time of the append.
    pub date: DateTime<Utc>,
    /// Whether the user has opened it.
    pub read: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    profiles: HashMap<String, ProfileTokens>,
    notifications: HashMap<String, Vec<StoredNotification>>,
    profile_writes: usize,
}

/// In-process document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token fields of a profile, if the profile has been written.
    pub fn profile(&self, uid: &str) -> Option<ProfileTokens> {
        self.state.lock().ok()?.profiles.get(uid).cloned()
    }

    /// All log entries for a user, oldest first.
    pub fn notifications(&self, uid: &str) -> Vec<StoredNotification> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.notifications.get(uid).cloned())
            .unwrap_or_default()
    }

    /// Number of token writes performed.
    pub fn profile_writes(&self) -> usize {
        self.state.lock().map(|s| s.profile_writes).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {e}"))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn update_push_token(&self, uid: &str, token: &RegistrationToken) -> Result<()> {
        let mut state = self.lock()?;
        state.profile_writes += 1;
        let profile = state.profiles.entry(uid.to_string()).or_default();
        profile.fcm_token = Some(token.as_str().to_string());
        profile.last_token_update = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn append(&self, uid: &str, notification: &NormalizedNotification) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = StoredNotification {
            id: id.clone(),
            notification: notification.clone(),
            date: Utc::now(),
            read: false,
        };
        self.lock()?
            .notifications
            .entry(uid.to_string())
            .or_default()
            .push(entry);
        Ok(id)
    }
}
