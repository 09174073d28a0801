//! Directory Push - notification bootstrap for the directory app.
//!
//! This crate owns the one asynchronous subsystem of the directory/marketplace
//! client: getting push permission, capturing the registration token, saving
//! it to the user's profile, and turning foreground messages into toasts and
//! notification-log entries. Listing pages, routing and auth screens live
//! elsewhere and appear here only as collaborators.
//!
//! # Architecture
//!
//! The crate follows a composition-root pattern: the host builds each service
//! once and passes it by `Arc`; nothing is looked up globally.
//!
//! - **Adapter** - Platform permission/registration, owns the token store
//! - **Router** - Payload normalization, toasts, per-user notification log
//! - **Bootstrapper** - Once-per-user setup sequence with a sign-out reset
//! - **Prompt** - Standalone permission card
//!
//! ```text
//! SessionBootstrapper ─▶ NotificationAdapter::initialize
//!         │                     └─ registration callback ─▶ TokenStore
//!         ├─ TokenStore::wait ◀─────────────────────────────────┘
//!         └─ ProfileStore::update_push_token
//!
//! platform message ─▶ ForegroundRouter ─▶ ToastSink + NotificationLog
//! ```
//!
//! # Modules
//!
//! - [`adapter`] - Native and browser adapters, simulated platform
//! - [`router`] - Foreground message normalization and routing
//! - [`session`] - Session bootstrapper
//! - [`store`] / [`firestore`] - Persistence targets
//! - [`config`] - Configuration loading/saving

pub mod adapter;
pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod firestore;
pub mod i18n;
pub mod payload;
pub mod permission;
pub mod prompt;
pub mod router;
pub mod session;
pub mod store;
pub mod toast;
pub mod token;

// Re-export commonly used types
pub use adapter::{BrowserAdapter, NativeAdapter, NotificationAdapter, Platform};
pub use auth::{AuthProvider, AuthUser, CurrentUser};
pub use config::Config;
pub use error::NotifyError;
pub use payload::PushPayload;
pub use permission::PermissionStatus;
pub use router::{ForegroundRouter, NormalizedNotification};
pub use session::{BootstrapOutcome, SessionBootstrapper};
pub use token::{RegistrationToken, TokenStore};
