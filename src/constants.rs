//! Application-wide constants for the push bootstrap.
//!
//! Centralizes timing values and the translation keys the bootstrapper,
//! router and prompt fall back to, grouped by concern.
//!
//! # Categories
//!
//! - **Timing**: token wait budget and log preview length
//! - **Keys**: translation keys for toasts and stored records
//! - **Display**: defaults for locally presented notifications

use std::time::Duration;

// ============================================================================
// Timing
// ============================================================================

/// Budget the session bootstrapper gives platform registration.
pub const BOOTSTRAP_TOKEN_WAIT: Duration = Duration::from_secs(15);

/// Number of token characters shown in log previews.
pub const TOKEN_PREVIEW_LEN: usize = 20;

// ============================================================================
// Translation keys
// ============================================================================

/// Stored title key when the payload carries nothing usable.
pub const UNKNOWN_TITLE_KEY: &str = "unknownNotificationTitle";

/// Stored description key when the payload carries nothing usable.
pub const UNKNOWN_DESCRIPTION_KEY: &str = "unknownNotificationDescription";

/// Toast title shown when notification permission is denied.
pub const PERMISSION_DENIED_KEY: &str = "notificationPermissionDenied";

/// Toast description shown when notification permission is denied.
pub const PERMISSION_DENIED_DESC_KEY: &str = "notificationPermissionDeniedDesc";

/// Prompt title when permission has not been decided yet.
pub const ENABLE_NOTIFICATIONS_KEY: &str = "enableNotifications";

/// Prompt description when permission has not been decided yet.
pub const PERMISSION_REQUEST_DESC_KEY: &str = "notificationPermissionRequestDesc";

/// Instructions shown on native platforms where settings cannot be opened.
pub const SETTINGS_INSTRUCTIONS_KEY: &str = "notificationSettingsInstructions";

/// Default item type tag for stored notifications.
pub const DEFAULT_ITEM_TYPE: &str = "general";

// ============================================================================
// Local display
// ============================================================================

/// Local notification title when the payload has none.
pub const LOCAL_FALLBACK_TITLE: &str = "New Notification";

/// Local notification body when the payload has none.
pub const LOCAL_FALLBACK_BODY: &str = "You have a new message";

/// Icon used for browser notifications.
pub const DEFAULT_NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";

/// Sound used for native local notifications.
pub const NATIVE_NOTIFICATION_SOUND: &str = "default";

/// How native notifications present while the app is in the foreground.
pub const DEFAULT_PRESENTATION_OPTIONS: &[&str] = &["badge", "sound", "alert"];
