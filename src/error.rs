//! Failure taxonomy for the notification subsystem.
//!
//! None of these are fatal to the host application. The bootstrapper and
//! router log them (and toast for [`NotifyError::PermissionDenied`]) but never
//! return them to their caller.

/// Errors raised inside the notification subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The user refused notification permission.
    PermissionDenied,
    /// The platform push service rejected registration.
    RegistrationFailed(String),
    /// No registration token arrived within the wait budget.
    TokenTimeout,
    /// The placeholder map in a payload was not valid JSON.
    PayloadParse(String),
    /// A document-store write failed.
    Persistence(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "Notification permission denied"),
            Self::RegistrationFailed(msg) => write!(f, "Push registration failed: {msg}"),
            Self::TokenTimeout => write!(f, "Timed out waiting for registration token"),
            Self::PayloadParse(msg) => write!(f, "Payload parse error: {msg}"),
            Self::Persistence(msg) => write!(f, "Persistence failure: {msg}"),
        }
    }
}

impl std::error::Error for NotifyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            NotifyError::RegistrationFailed("no service".into()).to_string(),
            "Push registration failed: no service"
        );
        assert_eq!(
            NotifyError::TokenTimeout.to_string(),
            "Timed out waiting for registration token"
        );
    }
}
