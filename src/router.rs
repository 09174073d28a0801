//! Foreground message routing.
//!
//! Converts whatever a platform delivered into a [`NormalizedNotification`],
//! shows a toast, and appends the record to the signed-in user's log.
//!
//! # Field resolution
//!
//! ```text
//! payload.data (even empty)  → keys, placeholders, link, image, type, global flag
//! payload.notification       → title/body used as both text and stored key
//! neither                    → unknownNotificationTitle / ...Description
//! ```
//!
//! Native delivery puts `title`/`body` at the top level; those stand in for
//! the `notification` block when it is missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::constants::{DEFAULT_ITEM_TYPE, UNKNOWN_DESCRIPTION_KEY, UNKNOWN_TITLE_KEY};
use crate::error::NotifyError;
use crate::i18n::{Placeholders, Translator};
use crate::payload::PushPayload;
use crate::store::NotificationLog;
use crate::toast::{Toast, ToastSink};

/// The application's representation of an incoming message.
///
/// Immutable once built; stored as-is in the per-user notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNotification {
    /// Translation key (or literal title) for the headline.
    pub title_key: String,
    /// Translation key (or literal body) for the description.
    pub description_key: String,
    /// Values substituted into the description.
    pub description_placeholders: Placeholders,
    /// Image shown with the notification.
    pub image_url: Option<String>,
    /// Hint for image generation / alt text.
    pub data_ai_hint: Option<String>,
    /// In-app route or external URL opened on tap.
    pub link: Option<String>,
    /// Category tag (`general`, `order`, ...).
    pub item_type: String,
    /// Broadcast to all users; not stored per user.
    pub is_global: bool,
}

impl NormalizedNotification {
    fn unknown() -> Self {
        Self {
            title_key: UNKNOWN_TITLE_KEY.to_string(),
            description_key: UNKNOWN_DESCRIPTION_KEY.to_string(),
            description_placeholders: Placeholders::new(),
            image_url: None,
            data_ai_hint: None,
            link: None,
            item_type: DEFAULT_ITEM_TYPE.to_string(),
            is_global: false,
        }
    }
}

/// Build the normalized record for a payload. Never fails.
pub fn normalize(payload: &PushPayload) -> NormalizedNotification {
    let mut out = NormalizedNotification::unknown();

    if has_data(payload) {
        if let Some(key) = payload.data_str("titleKey") {
            out.title_key = key.to_string();
        }
        if let Some(key) = payload.data_str("descriptionKey") {
            out.description_key = key.to_string();
        }
        out.description_placeholders = placeholders(payload.data_value("descriptionPlaceholders"))
            .unwrap_or_else(|e| {
                log::error!("[Router] {e}; using empty placeholders");
                Placeholders::new()
            });
        out.image_url = payload.data_str("imageUrl").map(str::to_string);
        out.data_ai_hint = payload.data_str("dataAiHint").map(str::to_string);
        out.link = payload
            .data_str("link")
            .or_else(|| payload.data_str("url"))
            .map(str::to_string);
        if let Some(item_type) = payload.data_str("itemType") {
            out.item_type = item_type.to_string();
        }
        out.is_global = matches!(payload.data_value("isGlobal"), Some(Value::Bool(true)))
            || payload.data_str("isGlobal") == Some("true");
    } else if let Some((title, body, image)) = display_block(payload) {
        if let Some(title) = title {
            out.title_key = title.to_string();
        }
        if let Some(body) = body {
            out.description_key = body.to_string();
        }
        out.image_url = image.map(str::to_string);
    }

    out
}

/// Toast text for a payload and its normalized record.
///
/// Keys from the data block are translated with the placeholders; literal
/// notification text is shown as-is; anything missing falls back to the
/// translated unknown-notification keys.
pub fn toast_for(
    payload: &PushPayload,
    notification: &NormalizedNotification,
    translator: &dyn Translator,
) -> Toast {
    let block = display_block(payload);
    let block_title = block.and_then(|(t, _, _)| t);
    let block_body = block.and_then(|(_, b, _)| b);
    let ph = &notification.description_placeholders;

    let (title, description) = if has_data(payload) {
        let title = match payload.data_str("titleKey") {
            Some(key) => translator.translate(key, ph),
            None => block_title.map_or_else(|| translator.text(UNKNOWN_TITLE_KEY), str::to_string),
        };
        let description = match payload.data_str("descriptionKey") {
            Some(key) => translator.translate(key, ph),
            None => block_body
                .map_or_else(|| translator.text(UNKNOWN_DESCRIPTION_KEY), str::to_string),
        };
        (title, description)
    } else {
        (
            block_title.map_or_else(|| translator.text(UNKNOWN_TITLE_KEY), str::to_string),
            block_body.map_or_else(|| translator.text(UNKNOWN_DESCRIPTION_KEY), str::to_string),
        )
    };

    Toast::info(title, description)
}

// An empty `data: {}` still selects the data branch.
fn has_data(payload: &PushPayload) -> bool {
    payload.data.is_some()
}

type DisplayBlock<'a> = (Option<&'a str>, Option<&'a str>, Option<&'a str>);

/// `(title, body, image)` from the notification block, else the top level.
fn display_block(payload: &PushPayload) -> Option<DisplayBlock<'_>> {
    if let Some(block) = &payload.notification {
        return Some((
            payload.notification_title(),
            payload.notification_body(),
            block.image.as_deref().filter(|s| !s.is_empty()),
        ));
    }
    let title = payload.title.as_deref().filter(|s| !s.is_empty());
    let body = payload.body.as_deref().filter(|s| !s.is_empty());
    if title.is_none() && body.is_none() {
        return None;
    }
    Some((title, body, None))
}

fn placeholders(raw: Option<&Value>) -> Result<Placeholders, NotifyError> {
    match raw {
        None | Some(Value::Null) => Ok(Placeholders::new()),
        Some(Value::String(s)) if s.is_empty() => Ok(Placeholders::new()),
        Some(Value::String(s)) => {
            serde_json::from_str(s).map_err(|e| NotifyError::PayloadParse(e.to_string()))
        }
        Some(value) if value.is_object() => serde_json::from_value(value.clone())
            .map_err(|e| NotifyError::PayloadParse(e.to_string())),
        Some(other) => Err(NotifyError::PayloadParse(format!(
            "descriptionPlaceholders is not an object: {other}"
        ))),
    }
}

/// What the router did with one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// The normalized record.
    pub notification: NormalizedNotification,
    /// The toast that was shown.
    pub toast: Toast,
    /// Log document id when the record was appended to a user's log.
    pub stored_as: Option<String>,
}

/// Turns foreground messages into toasts and per-user log entries.
///
/// Safe to call at any time, whether or not a bootstrap run is active.
pub struct ForegroundRouter {
    auth: Arc<dyn AuthProvider>,
    log: Arc<dyn NotificationLog>,
    toasts: Arc<dyn ToastSink>,
    translator: Arc<dyn Translator>,
}

impl std::fmt::Debug for ForegroundRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundRouter").finish_non_exhaustive()
    }
}

impl ForegroundRouter {
    /// Wire the router to its collaborators.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        log: Arc<dyn NotificationLog>,
        toasts: Arc<dyn ToastSink>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            auth,
            log,
            toasts,
            translator,
        }
    }

    /// Handle one foreground message. Never fails.
    pub async fn route(&self, payload: &PushPayload) -> Routed {
        let notification = normalize(payload);
        let toast = toast_for(payload, &notification, self.translator.as_ref());
        log::info!(
            "[Router] Foreground message: title_key={}, item_type={}, global={}",
            notification.title_key,
            notification.item_type,
            notification.is_global
        );
        self.toasts.show(toast.clone());

        let stored_as = match self.auth.current_uid() {
            None => {
                log::debug!("[Router] No signed-in user; not storing notification");
                None
            }
            Some(_) if notification.is_global => {
                log::debug!("[Router] Global notification; not storing per user");
                None
            }
            Some(uid) => match self.log.append(&uid, &notification).await {
                Ok(id) => Some(id),
                Err(e) => {
                    log::error!(
                        "[Router] {}",
                        NotifyError::Persistence(format!("saving foreground notification: {e:#}"))
                    );
                    None
                }
            },
        };

        Routed {
            notification,
            toast,
            stored_as,
        }
    }
}
