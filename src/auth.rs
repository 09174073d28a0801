//! Signed-in user identity.
//!
//! The authentication provider itself is external; this module defines the
//! narrow view the notification subsystem needs and a simple holder the
//! composition root updates on auth state changes.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// The signed-in user as seen by the notification subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Stable user id (profile document key).
    pub uid: String,
    /// Registration token last written to the user's profile, if any.
    #[serde(default)]
    pub fcm_token: Option<String>,
}

impl AuthUser {
    /// User with no stored token.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            fcm_token: None,
        }
    }

    /// Builder-style setter for the stored profile token.
    pub fn with_fcm_token(mut self, token: impl Into<String>) -> Self {
        self.fcm_token = Some(token.into());
        self
    }
}

/// Source of the current signed-in user.
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, or `None` when signed out.
    fn current_user(&self) -> Option<AuthUser>;

    /// Convenience accessor for the current uid.
    fn current_uid(&self) -> Option<String> {
        self.current_user().map(|u| u.uid)
    }
}

/// Holder for the current user, updated by the auth state listener.
#[derive(Debug, Default)]
pub struct CurrentUser {
    user: RwLock<Option<AuthUser>>,
}

impl CurrentUser {
    /// Start signed out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current user (`None` on sign-out).
    pub fn set(&self, user: Option<AuthUser>) {
        if let Ok(mut slot) = self.user.write() {
            *slot = user;
        }
    }
}

impl AuthProvider for CurrentUser {
    fn current_user(&self) -> Option<AuthUser> {
        self.user.read().ok().and_then(|u| u.clone())
    }
}
