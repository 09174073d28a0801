//! Normalized notification permission status.

use serde::{Deserialize, Serialize};

/// Permission state as reported by either platform.
///
/// Native push reports `prompt` / `prompt-with-rationale` for the undecided
/// state, browsers report `default`. Both collapse to [`PermissionStatus::Prompt`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    /// The user allowed notifications.
    Granted,
    /// The user refused notifications.
    Denied,
    /// The user has not decided yet.
    #[default]
    #[serde(rename = "default", alias = "prompt")]
    Prompt,
}

impl PermissionStatus {
    /// Parse a platform permission string.
    ///
    /// Unknown values are treated as undecided so callers can prompt again.
    pub fn from_platform(value: &str) -> Self {
        match value {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            _ => Self::Prompt,
        }
    }

    /// Returns the string form used in logs and the browser API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "default",
        }
    }

    /// Shorthand for `== Granted`.
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_platform_known_values() {
        assert_eq!(PermissionStatus::from_platform("granted"), PermissionStatus::Granted);
        assert_eq!(PermissionStatus::from_platform("denied"), PermissionStatus::Denied);
        assert_eq!(PermissionStatus::from_platform("default"), PermissionStatus::Prompt);
        assert_eq!(PermissionStatus::from_platform("prompt"), PermissionStatus::Prompt);
    }

    #[test]
    fn test_from_platform_unknown_is_prompt() {
        assert_eq!(
            PermissionStatus::from_platform("prompt-with-rationale"),
            PermissionStatus::Prompt
        );
        assert_eq!(PermissionStatus::from_platform(""), PermissionStatus::Prompt);
    }

    #[test]
    fn test_serde_accepts_browser_default() {
        let status: PermissionStatus = serde_json::from_str("\"default\"").expect("parse");
        assert_eq!(status, PermissionStatus::Prompt);
        let status: PermissionStatus = serde_json::from_str("\"prompt\"").expect("parse");
        assert_eq!(status, PermissionStatus::Prompt);
        let status: PermissionStatus = serde_json::from_str("\"granted\"").expect("parse");
        assert!(status.is_granted());
    }

    #[test]
    fn test_wire_form_matches_display() {
        assert_eq!(PermissionStatus::default(), PermissionStatus::Prompt);
        for status in [
            PermissionStatus::Granted,
            PermissionStatus::Denied,
            PermissionStatus::Prompt,
        ] {
            let json = serde_json::to_string(&status).expect("serialize");
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
