//! Incoming push message shapes.
//!
//! Both platforms deliver JSON that is loosely typed: native push puts
//! `title`/`body` at the top level, browser messaging nests them under
//! `notification`, and either may carry a `data` block whose values are
//! usually (but not always) strings. Fields are kept raw here; the router
//! decides how to read them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `notification` block of a push message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationBlock {
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A push message as delivered by either platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Top-level title (native delivery).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Top-level body (native delivery).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Platform message id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Structured application data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    /// Display block (browser delivery).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationBlock>,
}

impl PushPayload {
    /// Parse a payload from JSON text.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Non-empty string value from the data block.
    ///
    /// Empty strings count as absent, matching how senders blank out fields.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        match self.data.as_ref()?.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Raw value from the data block.
    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }

    /// Non-empty `notification.title`.
    pub fn notification_title(&self) -> Option<&str> {
        non_empty(self.notification.as_ref()?.title.as_deref())
    }

    /// Non-empty `notification.body`.
    pub fn notification_body(&self) -> Option<&str> {
        non_empty(self.notification.as_ref()?.body.as_deref())
    }
}

/// A tap or action on a delivered notification (native only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAction {
    /// Identifier of the action performed (`tap` for a plain tap).
    pub action_id: String,
    /// The notification the action was performed on.
    pub notification: PushPayload,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browser_shape() {
        let payload = PushPayload::from_json(
            r#"{"notification": {"title": "Hi", "body": "There"}, "data": {"link": "/orders"}}"#,
        )
        .expect("parse");
        assert_eq!(payload.notification_title(), Some("Hi"));
        assert_eq!(payload.notification_body(), Some("There"));
        assert_eq!(payload.data_str("link"), Some("/orders"));
    }

    #[test]
    fn test_parse_native_shape() {
        let payload =
            PushPayload::from_json(r#"{"title": "T", "body": "B", "id": "42", "data": {}}"#)
                .expect("parse");
        assert_eq!(payload.title.as_deref(), Some("T"));
        assert_eq!(payload.id.as_deref(), Some("42"));
        assert!(payload.notification.is_none());
    }

    #[test]
    fn test_data_str_skips_empty_and_non_strings() {
        let payload =
            PushPayload::from_json(r#"{"data": {"a": "", "b": true, "c": "x"}}"#).expect("parse");
        assert_eq!(payload.data_str("a"), None);
        assert_eq!(payload.data_str("b"), None);
        assert_eq!(payload.data_str("c"), Some("x"));
        assert_eq!(payload.data_value("b"), Some(&Value::Bool(true)));
    }
}
