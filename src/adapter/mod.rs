//! Platform notification adapters.
//!
//! One interface, two variants: native mobile push (through the web-to-native
//! bridge) and browser push (through the document store's messaging channel).
//! The bootstrapper, router and prompt only ever see [`NotificationAdapter`].
//!
//! # Architecture
//!
//! ```text
//! NotificationAdapter (trait)
//!     │
//!     ├── NativeAdapter ── NativePushBridge
//!     │       permission → register → listener task
//!     │                                 ├── registration  → TokenStore
//!     │                                 ├── received      → ForegroundRouter + LocalNotifier
//!     │                                 └── error/action  → log
//!     │
//!     └── BrowserAdapter ── BrowserMessaging
//!             permission → foreground listener task → ForegroundRouter + LocalNotifier
//!                        → token request            → TokenStore
//! ```
//!
//! Each adapter owns the process's [`TokenStore`]; build exactly one adapter at
//! the composition root and pass it by `Arc` to everything that needs it.

pub mod browser;
pub mod native;
pub mod simulated;

pub use browser::{BrowserAdapter, BrowserMessaging, BrowserOptions};
pub use native::{NativeAdapter, NativeEvent, NativePushBridge};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::constants::{LOCAL_FALLBACK_BODY, LOCAL_FALLBACK_TITLE, NATIVE_NOTIFICATION_SOUND};
use crate::payload::PushPayload;
use crate::permission::PermissionStatus;
use crate::token::{RegistrationToken, TokenStore};

/// Where the application is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Packaged native mobile app.
    Native,
    /// Plain browser.
    Web,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// Permission, registration and token access for one platform.
///
/// None of these methods fail outward: errors are logged and reflected in the
/// returned status, so callers re-check state instead of catching.
#[async_trait]
pub trait NotificationAdapter: Send + Sync {
    /// Which platform this adapter drives.
    fn platform(&self) -> Platform;

    /// Request permission, register for delivery and attach listeners.
    ///
    /// Idempotent: once delivery is set up, later calls return immediately.
    /// Concurrent calls are serialized so side effects never run twice.
    async fn initialize(&self);

    /// Current permission status. No side effects.
    async fn check_permission(&self) -> PermissionStatus;

    /// Prompt for permission; `true` when granted.
    async fn request_permission(&self) -> bool;

    /// The token store this adapter writes to.
    fn tokens(&self) -> &TokenStore;

    /// Last captured registration token, without waiting.
    fn fcm_token(&self) -> Option<RegistrationToken> {
        self.tokens().get()
    }

    /// Wait up to `timeout` for a registration token.
    async fn wait_for_fcm_token(&self, timeout: Duration) -> Option<RegistrationToken> {
        self.tokens().wait(timeout).await
    }
}

/// A notification presented by the OS or browser while the app is open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalNotification {
    /// Unique id (epoch milliseconds at creation).
    pub id: i64,
    /// Title text.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Sound name (native only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// Icon URL (browser only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// The payload's data block, passed through to tap handlers.
    pub extra: Map<String, Value>,
}

impl LocalNotification {
    /// Build the display record for a native foreground message.
    pub fn native(payload: &PushPayload) -> Self {
        let mut n = Self::base(payload);
        n.sound = Some(NATIVE_NOTIFICATION_SOUND.to_string());
        n
    }

    /// Build the display record for a browser foreground message.
    pub fn web(payload: &PushPayload, icon: &str) -> Self {
        let mut n = Self::base(payload);
        n.icon = Some(icon.to_string());
        n
    }

    fn base(payload: &PushPayload) -> Self {
        let title = first_text(&[
            payload.title.as_deref(),
            payload.data_str("title"),
            payload.notification_title(),
        ])
        .unwrap_or(LOCAL_FALLBACK_TITLE);
        let body = first_text(&[
            payload.body.as_deref(),
            payload.data_str("body"),
            payload.notification_body(),
        ])
        .unwrap_or(LOCAL_FALLBACK_BODY);

        Self {
            id: chrono::Utc::now().timestamp_millis(),
            title: title.to_string(),
            body: body.to_string(),
            sound: None,
            icon: None,
            extra: payload.data.clone().unwrap_or_default(),
        }
    }
}

fn first_text<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates.iter().flatten().copied().find(|s| !s.is_empty())
}

/// Presents local notifications (native scheduler or browser `Notification`).
#[async_trait]
pub trait LocalNotifier: Send + Sync {
    /// Show one notification now.
    async fn show(&self, notification: LocalNotification) -> anyhow::Result<()>;
}

/// Show a local notification, logging instead of failing.
pub(crate) async fn present(notifier: &dyn LocalNotifier, notification: LocalNotification) {
    log::debug!(
        "[Push] Showing local notification: {} / {}",
        notification.title,
        notification.body
    );
    if let Err(e) = notifier.show(notification).await {
        log::error!("[Push] Error showing local notification: {e:#}");
    }
}

/// Initialization progress shared by both adapter variants.
#[derive(Debug, Default)]
pub(crate) struct InitState {
    /// Delivery fully set up; further `initialize` calls are no-ops.
    pub initialized: bool,
    /// The user was already asked; later attempts only re-check the status.
    pub prompted: bool,
    /// Listener task attached; never attach twice.
    pub listening: bool,
}
