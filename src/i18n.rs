//! Translation lookup with `{placeholder}` interpolation.
//!
//! Notification records store translation keys rather than text, so the same
//! record renders in whichever language the user picks later. Toasts are the
//! only place keys are resolved inside this crate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A primitive placeholder value carried in a notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaceholderValue {
    /// Text value.
    Text(String),
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(serde_json::Number),
    /// Explicit null.
    Null,
}

impl std::fmt::Display for PlaceholderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Null => Ok(()),
        }
    }
}

impl From<&str> for PlaceholderValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Placeholder name → value, ordered for stable serialization.
pub type Placeholders = BTreeMap<String, PlaceholderValue>;

/// Resolves translation keys to user-visible text.
pub trait Translator: Send + Sync {
    /// Translate `key`, substituting `{name}` placeholders.
    fn translate(&self, key: &str, placeholders: &Placeholders) -> String;

    /// Translate a key with no placeholders.
    fn text(&self, key: &str) -> String {
        self.translate(key, &Placeholders::new())
    }
}

/// In-memory message catalog for one language.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    /// Create an empty catalog. Every key translates to itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.insert(key, message);
        self
    }

    /// Add or replace a message.
    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.messages.insert(key.into(), message.into());
    }

    /// Load a flat `{ "key": "message" }` JSON object.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let messages: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { messages })
    }

    /// Overlay `other` on this catalog; its messages win.
    pub fn merge(&mut self, other: Catalog) {
        self.messages.extend(other.messages);
    }

    /// English messages for every key this crate emits on its own.
    pub fn english() -> Self {
        use crate::constants::*;
        Self::new()
            .with(UNKNOWN_TITLE_KEY, "New notification")
            .with(UNKNOWN_DESCRIPTION_KEY, "You have received a new notification.")
            .with(PERMISSION_DENIED_KEY, "Notifications are blocked")
            .with(
                PERMISSION_DENIED_DESC_KEY,
                "Enable notifications in your device settings to receive order updates.",
            )
            .with(ENABLE_NOTIFICATIONS_KEY, "Enable notifications")
            .with(
                PERMISSION_REQUEST_DESC_KEY,
                "Get notified about your orders and new services.",
            )
            .with(
                SETTINGS_INSTRUCTIONS_KEY,
                "Open Settings, find this app and turn on notifications.",
            )
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str, placeholders: &Placeholders) -> String {
        let template = self.messages.get(key).map_or(key, String::as_str);
        interpolate(template, placeholders)
    }
}

/// Replace `{name}` occurrences with placeholder values.
///
/// Unknown placeholders are left as written.
pub fn interpolate(template: &str, placeholders: &Placeholders) -> String {
    if placeholders.is_empty() || !template.contains('{') {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match placeholders.get(name) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholders(pairs: &[(&str, &str)]) -> Placeholders {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), PlaceholderValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_interpolate_substitutes_known_names() {
        let out = interpolate(
            "Your order at {serviceName} is confirmed",
            &placeholders(&[("serviceName", "Clinic A")]),
        );
        assert_eq!(out, "Your order at Clinic A is confirmed");
    }

    #[test]
    fn test_interpolate_keeps_unknown_and_unclosed() {
        let ph = placeholders(&[("a", "1")]);
        assert_eq!(interpolate("{a} {b}", &ph), "1 {b}");
        assert_eq!(interpolate("{a} {oops", &ph), "1 {oops");
    }

    #[test]
    fn test_catalog_unknown_key_returns_key() {
        let catalog = Catalog::new();
        assert_eq!(catalog.text("missingKey"), "missingKey");
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog = Catalog::from_json(r#"{"hello": "Hi {name}"}"#).expect("parse");
        let out = catalog.translate("hello", &placeholders(&[("name", "Bat")]));
        assert_eq!(out, "Hi Bat");
    }

    #[test]
    fn test_merge_overrides_and_keeps_defaults() {
        let mut catalog = Catalog::english();
        catalog.merge(
            Catalog::from_json(r#"{"unknownNotificationTitle": "Neue Nachricht"}"#)
                .expect("parse"),
        );
        assert_eq!(catalog.text("unknownNotificationTitle"), "Neue Nachricht");
        assert_eq!(catalog.text("enableNotifications"), "Enable notifications");
    }

    #[test]
    fn test_placeholder_value_display() {
        let number: PlaceholderValue = serde_json::from_str("42").expect("parse");
        assert_eq!(number.to_string(), "42");
        assert_eq!(PlaceholderValue::Null.to_string(), "");
    }
}
