//! Registration token store.
//!
//! Holds the single live push-registration token for this process. The
//! platform registration callback is the only writer; the bootstrapper and any
//! UI observers read snapshots or wait for the first value.
//!
//! Backed by a `tokio::sync::watch` channel so waiters wake the moment the
//! token is written instead of polling. `watch` keeps the last value, so a
//! waiter that subscribes after the callback fired sees it immediately.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::constants::TOKEN_PREVIEW_LEN;

/// Opaque device token issued by the platform push service.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationToken(String);

impl RegistrationToken {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The full token value, for persistence only.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form safe for logs.
    pub fn preview(&self) -> String {
        let cut = self
            .0
            .char_indices()
            .nth(TOKEN_PREVIEW_LEN)
            .map_or(self.0.len(), |(idx, _)| idx);
        format!("{}...", &self.0[..cut])
    }
}

// Debug and Display both redact so tokens never reach logs whole.
impl std::fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RegistrationToken").field(&self.preview()).finish()
    }
}

impl std::fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.preview())
    }
}

impl From<String> for RegistrationToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RegistrationToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Process-wide holder of the current registration token.
///
/// Cheap to clone; all clones share one slot.
#[derive(Debug, Clone)]
pub struct TokenStore {
    tx: Arc<watch::Sender<Option<RegistrationToken>>>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record a token from the registration callback, replacing any previous one.
    pub fn set(&self, token: RegistrationToken) {
        log::info!("[Token] Registration token stored: {}", token.preview());
        if let Some(previous) = self.tx.send_replace(Some(token)) {
            log::debug!("[Token] Replaced previous token {}", previous.preview());
        }
    }

    /// Snapshot of the current token. Never blocks.
    pub fn get(&self) -> Option<RegistrationToken> {
        let token = self.tx.borrow().clone();
        log::debug!(
            "[Token] Getting token: {}",
            token.as_ref().map_or("no token".to_string(), RegistrationToken::preview)
        );
        token
    }

    /// Wait up to `timeout` for a token to appear.
    ///
    /// Resolves immediately when a token is already stored. Returns `None` once
    /// the timeout elapses; an absent token is not an error.
    pub async fn wait(&self, timeout: Duration) -> Option<RegistrationToken> {
        let mut rx = self.tx.subscribe();
        // Bound to a local so the borrowed `Ref` drops before `rx`.
        let found = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(token)) => {
                log::info!("[Token] Token available");
                (*token).clone()
            }
            Ok(Err(_)) => None,
            Err(_) => {
                log::warn!("[Token] Timeout waiting for registration token after {:?}", timeout);
                None
            }
        };
        found
    }

    /// Like [`TokenStore::wait`], but also gives up when `cancel` fires.
    pub async fn wait_cancellable(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<RegistrationToken> {
        tokio::select! {
            biased;
            token = self.wait(timeout) => token,
            () = cancel.cancelled() => {
                log::info!("[Token] Token wait cancelled");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_preview_truncates() {
        let token = RegistrationToken::new("abcdefghijklmnopqrstuvwxyz0123456789");
        assert_eq!(token.preview(), "abcdefghijklmnopqrst...");
        assert_eq!(format!("{token}"), "abcdefghijklmnopqrst...");
    }

    #[test]
    fn test_preview_short_token() {
        let token = RegistrationToken::new("short");
        assert_eq!(token.preview(), "short...");
    }

    #[test]
    fn test_set_overwrites() {
        let store = TokenStore::new();
        assert!(store.get().is_none());
        store.set("first".into());
        store.set("second".into());
        assert_eq!(store.get(), Some(RegistrationToken::new("second")));
    }

    #[test]
    fn test_clones_share_slot() {
        let store = TokenStore::new();
        let observer = store.clone();
        store.set("shared".into());
        assert_eq!(observer.get().map(|t| t.as_str().to_string()), Some("shared".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_with_none() {
        let store = TokenStore::new();
        let start = Instant::now();
        let token = store.wait(Duration::from_millis(1500)).await;
        let elapsed = start.elapsed();

        assert!(token.is_none());
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed <= Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_existing_token_immediately() {
        let store = TokenStore::new();
        store.set("ready".into());

        let start = Instant::now();
        let token = store.wait(Duration::from_secs(15)).await;
        assert_eq!(token, Some(RegistrationToken::new("ready")));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_late_registration() {
        let store = TokenStore::new();
        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            writer.set("late".into());
        });

        let start = Instant::now();
        let token = store.wait(Duration::from_secs(15)).await;
        assert_eq!(token, Some(RegistrationToken::new("late")));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancellable_stops_early() {
        let store = TokenStore::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let token = store.wait_cancellable(Duration::from_secs(15), &cancel).await;
        assert!(token.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
