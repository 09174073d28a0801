//! Per-session notification bootstrap.
//!
//! Runs once per signed-in user per process: initialize the adapter, wait for
//! a registration token, write it to the profile if it changed, and warn the
//! user when notifications are blocked.
//!
//! # State machine
//!
//! ```text
//! Idle ──sign-in(U)──▶ InProgress(U) ──run ends──▶ Completed(U)
//!  ▲                        │                           │
//!  └──────sign-out──────────┴───────────sign-out────────┘
//! ```
//!
//! The guard moves to `InProgress` synchronously, before the first await, so
//! two overlapping auth events for the same user cannot both start a run.
//! A different user signing in without a sign-out in between starts a new run
//! and cancels the old one.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapter::NotificationAdapter;
use crate::auth::AuthUser;
use crate::constants::{BOOTSTRAP_TOKEN_WAIT, PERMISSION_DENIED_DESC_KEY, PERMISSION_DENIED_KEY};
use crate::error::NotifyError;
use crate::i18n::Translator;
use crate::permission::PermissionStatus;
use crate::store::ProfileStore;
use crate::toast::{Toast, ToastSink};
use crate::token::RegistrationToken;

/// Where the bootstrap guard stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BootstrapState {
    /// No signed-in user has been set up.
    #[default]
    Idle,
    /// A run is underway for this uid.
    InProgress(String),
    /// A run finished for this uid; no more runs until sign-out.
    Completed(String),
}

impl BootstrapState {
    fn user(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::InProgress(uid) | Self::Completed(uid) => Some(uid),
        }
    }
}

/// What one bootstrap run found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// The user the run was for.
    pub uid: String,
    /// Token obtained within the wait budget.
    pub token: Option<RegistrationToken>,
    /// Whether the token was written to the profile.
    pub token_persisted: bool,
    /// Permission after initialization.
    pub permission: PermissionStatus,
    /// Handled failures, in the order they happened.
    pub issues: Vec<NotifyError>,
}

/// Result of asking the bootstrapper to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Already running or done for this user; nothing happened.
    Skipped,
    /// The user signed out while the run was waiting.
    Cancelled,
    /// The run finished.
    Completed(BootstrapReport),
}

#[derive(Debug, Default)]
struct Guard {
    state: BootstrapState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Drives the adapter once per signed-in user.
pub struct SessionBootstrapper {
    adapter: Arc<dyn NotificationAdapter>,
    profiles: Arc<dyn ProfileStore>,
    toasts: Arc<dyn ToastSink>,
    translator: Arc<dyn Translator>,
    token_wait: Duration,
    guard: Mutex<Guard>,
}

impl std::fmt::Debug for SessionBootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBootstrapper")
            .field("platform", &self.adapter.platform())
            .field("token_wait", &self.token_wait)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SessionBootstrapper {
    /// Wire the bootstrapper to its collaborators.
    pub fn new(
        adapter: Arc<dyn NotificationAdapter>,
        profiles: Arc<dyn ProfileStore>,
        toasts: Arc<dyn ToastSink>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            adapter,
            profiles,
            toasts,
            translator,
            token_wait: BOOTSTRAP_TOKEN_WAIT,
            guard: Mutex::new(Guard::default()),
        }
    }

    /// Override how long a run waits for a registration token.
    pub fn with_token_wait(mut self, token_wait: Duration) -> Self {
        self.token_wait = token_wait;
        self
    }

    /// Current guard state.
    pub fn state(&self) -> BootstrapState {
        self.guard
            .lock()
            .map(|g| g.state.clone())
            .unwrap_or_default()
    }

    /// Auth state listener entry point.
    ///
    /// Sign-out resets the guard immediately. Sign-in claims the guard
    /// synchronously and spawns the run; returns `None` when no run started.
    pub fn on_auth_changed(
        self: &Arc<Self>,
        user: Option<AuthUser>,
    ) -> Option<JoinHandle<BootstrapOutcome>> {
        let Some(user) = user else {
            self.sign_out();
            return None;
        };
        let (generation, cancel) = self.begin(&user.uid)?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            this.run_claimed(&user, generation, &cancel).await
        }))
    }

    /// Run the bootstrap sequence for `user` unless it already ran this session.
    pub async fn bootstrap(&self, user: &AuthUser) -> BootstrapOutcome {
        match self.begin(&user.uid) {
            Some((generation, cancel)) => self.run_claimed(user, generation, &cancel).await,
            None => BootstrapOutcome::Skipped,
        }
    }

    /// Reset the guard so the next sign-in runs again; cancels any waiting run.
    pub fn sign_out(&self) {
        let Ok(mut guard) = self.guard.lock() else {
            return;
        };
        if let Some(cancel) = guard.cancel.take() {
            cancel.cancel();
        }
        if guard.state != BootstrapState::Idle {
            log::info!("[Bootstrap] User signed out, resetting setup tracking");
        }
        guard.state = BootstrapState::Idle;
        guard.generation += 1;
    }

    /// Claim the guard for `uid`. `None` when a run already covers this user.
    fn begin(&self, uid: &str) -> Option<(u64, CancellationToken)> {
        let mut guard = self.guard.lock().ok()?;
        if guard.state.user() == Some(uid) {
            log::debug!("[Bootstrap] Skipping notification setup - already handled for {uid}");
            return None;
        }
        if let Some(previous) = guard.cancel.take() {
            previous.cancel();
        }

        let cancel = CancellationToken::new();
        guard.generation += 1;
        guard.state = BootstrapState::InProgress(uid.to_string());
        guard.cancel = Some(cancel.clone());
        Some((guard.generation, cancel))
    }

    fn finish(&self, uid: &str, generation: u64) {
        let Ok(mut guard) = self.guard.lock() else {
            return;
        };
        // A sign-out or another user's sign-in since begin() owns the guard now.
        if guard.generation == generation {
            guard.state = BootstrapState::Completed(uid.to_string());
            guard.cancel = None;
        }
    }

    async fn run_claimed(
        &self,
        user: &AuthUser,
        generation: u64,
        cancel: &CancellationToken,
    ) -> BootstrapOutcome {
        let outcome = self.run(user, cancel).await;
        if !matches!(outcome, BootstrapOutcome::Cancelled) {
            self.finish(&user.uid, generation);
        }
        outcome
    }

    async fn run(&self, user: &AuthUser, cancel: &CancellationToken) -> BootstrapOutcome {
        let uid = user.uid.as_str();
        log::info!(
            "[Bootstrap] Starting notification setup for user {uid} (profile token: {})",
            user.fcm_token
                .as_deref()
                .map_or("none".to_string(), |t| RegistrationToken::from(t).preview())
        );
        let mut issues = Vec::new();

        self.adapter.initialize().await;
        log::info!("[Bootstrap] Notification adapter initialized");

        let token = self
            .adapter
            .tokens()
            .wait_cancellable(self.token_wait, cancel)
            .await;
        if cancel.is_cancelled() {
            log::info!("[Bootstrap] Setup for {uid} cancelled");
            return BootstrapOutcome::Cancelled;
        }

        let mut token_persisted = false;
        match &token {
            Some(token) if user.fcm_token.as_deref() == Some(token.as_str()) => {
                log::info!("[Bootstrap] Registration token unchanged, no update needed");
            }
            Some(token) => {
                log::info!("[Bootstrap] New registration token {}, updating profile", token.preview());
                match self.profiles.update_push_token(uid, token).await {
                    Ok(()) => {
                        token_persisted = true;
                        log::info!("[Bootstrap] Profile updated with new registration token");
                    }
                    Err(e) => {
                        let issue = NotifyError::Persistence(format!("{e:#}"));
                        log::error!("[Bootstrap] {issue}");
                        issues.push(issue);
                    }
                }
            }
            None => {
                log::warn!("[Bootstrap] No registration token received within timeout");
                issues.push(NotifyError::TokenTimeout);
            }
        }

        // Sign-out may land while the profile write is in flight.
        if cancel.is_cancelled() {
            log::info!("[Bootstrap] Setup for {uid} cancelled after token step");
            return BootstrapOutcome::Cancelled;
        }

        let permission = self.adapter.check_permission().await;
        log::info!("[Bootstrap] Permission status: {permission}");
        if cancel.is_cancelled() {
            log::info!("[Bootstrap] Setup for {uid} cancelled before permission warning");
            return BootstrapOutcome::Cancelled;
        }
        if permission == PermissionStatus::Denied {
            self.toasts.show(Toast::destructive(
                self.translator.text(PERMISSION_DENIED_KEY),
                self.translator.text(PERMISSION_DENIED_DESC_KEY),
            ));
            issues.push(NotifyError::PermissionDenied);
        }

        BootstrapOutcome::Completed(BootstrapReport {
            uid: uid.to_string(),
            token,
            token_persisted,
            permission,
            issues,
        })
    }
}
