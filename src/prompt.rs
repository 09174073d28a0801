//! Standalone notification permission prompt.
//!
//! Backs the in-app card that asks the user to allow notifications. It talks
//! to the adapter directly and works whether or not a bootstrap run has
//! happened. Rendering is left to the UI layer via [`PromptView`].

use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::adapter::{NotificationAdapter, Platform};
use crate::constants::{
    ENABLE_NOTIFICATIONS_KEY, PERMISSION_DENIED_DESC_KEY, PERMISSION_DENIED_KEY,
    PERMISSION_REQUEST_DESC_KEY, SETTINGS_INSTRUCTIONS_KEY,
};
use crate::permission::PermissionStatus;

/// Icon shown in the prompt header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptIcon {
    /// Undecided.
    Bell,
    /// Blocked.
    BellOff,
}

/// Buttons the prompt offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptAction {
    /// Ask for permission (`requesting` shows while a request is in flight).
    Allow {
        /// A request is in flight; the button is disabled.
        requesting: bool,
    },
    /// Point the user at system settings.
    OpenSettings,
    /// Hide the prompt for now.
    NotNow,
}

/// What the UI should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptView {
    /// Header icon.
    pub icon: PromptIcon,
    /// Translation key for the title.
    pub title_key: &'static str,
    /// Translation key for the description.
    pub description_key: &'static str,
    /// Buttons, in display order.
    pub actions: Vec<PromptAction>,
}

/// Result of the open-settings button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Native apps cannot open settings; show these instructions instead.
    ShowInstructions(&'static str),
    /// The browser was asked again; carries the resulting status.
    Requested(PermissionStatus),
}

#[derive(Debug)]
struct PromptState {
    status: PermissionStatus,
    visible: bool,
    requesting: bool,
}

/// Permission prompt state.
pub struct PermissionPrompt {
    adapter: Arc<dyn NotificationAdapter>,
    state: Mutex<PromptState>,
}

impl std::fmt::Debug for PermissionPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionPrompt")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PermissionPrompt {
    /// Create a hidden prompt; call [`PermissionPrompt::refresh`] on mount.
    pub fn new(adapter: Arc<dyn NotificationAdapter>) -> Self {
        Self {
            adapter,
            state: Mutex::new(PromptState {
                status: PermissionStatus::Prompt,
                visible: false,
                requesting: false,
            }),
        }
    }

    /// Re-read permission and show the prompt unless already granted.
    pub async fn refresh(&self) -> PermissionStatus {
        let status = self.adapter.check_permission().await;
        self.update(|s| {
            s.status = status;
            if !status.is_granted() {
                s.visible = true;
            }
        });
        status
    }

    /// Ask for permission. On grant, hides the prompt and re-runs adapter
    /// initialization so delivery is set up without waiting for a new session.
    pub async fn allow(&self) -> bool {
        self.update(|s| s.requesting = true);
        let granted = self.adapter.request_permission().await;
        if granted {
            self.update(|s| {
                s.status = PermissionStatus::Granted;
                s.visible = false;
            });
            self.adapter.initialize().await;
        } else {
            log::info!("[Prompt] Permission not granted");
            self.update(|s| s.status = PermissionStatus::Denied);
        }
        self.update(|s| s.requesting = false);
        granted
    }

    /// The "not now" button.
    pub fn dismiss(&self) {
        self.update(|s| s.visible = false);
    }

    /// The "open settings" button.
    pub async fn open_settings(&self) -> SettingsAction {
        match self.adapter.platform() {
            Platform::Native => SettingsAction::ShowInstructions(SETTINGS_INSTRUCTIONS_KEY),
            Platform::Web => {
                self.adapter.request_permission().await;
                let status = self.adapter.check_permission().await;
                self.update(|s| s.status = status);
                SettingsAction::Requested(status)
            }
        }
    }

    /// Render model, or `None` when the prompt is hidden.
    pub fn view(&self) -> Option<PromptView> {
        let state = self.state.lock().ok()?;
        if !state.visible || state.status.is_granted() {
            return None;
        }

        let denied = state.status == PermissionStatus::Denied;
        let mut actions = Vec::with_capacity(2);
        if denied {
            actions.push(PromptAction::OpenSettings);
        } else {
            actions.push(PromptAction::Allow {
                requesting: state.requesting,
            });
        }
        actions.push(PromptAction::NotNow);

        Some(PromptView {
            icon: if denied { PromptIcon::BellOff } else { PromptIcon::Bell },
            title_key: if denied {
                PERMISSION_DENIED_KEY
            } else {
                ENABLE_NOTIFICATIONS_KEY
            },
            description_key: if denied {
                PERMISSION_DENIED_DESC_KEY
            } else {
                PERMISSION_REQUEST_DESC_KEY
            },
            actions,
        })
    }

    fn update(&self, f: impl FnOnce(&mut PromptState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut *state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::simulated::{RecordingNotifier, SimulatedPush};
    use crate::adapter::{
        BrowserAdapter, BrowserMessaging, BrowserOptions, LocalNotifier, NativeAdapter,
        NativePushBridge,
    };
    use crate::auth::CurrentUser;
    use crate::i18n::Catalog;
    use crate::router::ForegroundRouter;
    use crate::store::{MemoryStore, NotificationLog};
    use crate::toast::RecordingToasts;

    fn router() -> Arc<ForegroundRouter> {
        Arc::new(ForegroundRouter::new(
            Arc::new(CurrentUser::new()),
            Arc::new(MemoryStore::new()) as Arc<dyn NotificationLog>,
            Arc::new(RecordingToasts::new()),
            Arc::new(Catalog::english()),
        ))
    }

    fn native(push: &Arc<SimulatedPush>) -> Arc<dyn NotificationAdapter> {
        Arc::new(NativeAdapter::new(
            Arc::clone(push) as Arc<dyn NativePushBridge>,
            router(),
            Arc::new(RecordingNotifier::new()) as Arc<dyn LocalNotifier>,
        ))
    }

    fn web(push: &Arc<SimulatedPush>) -> Arc<dyn NotificationAdapter> {
        Arc::new(BrowserAdapter::new(
            Arc::clone(push) as Arc<dyn BrowserMessaging>,
            BrowserOptions::default(),
            router(),
            Arc::new(RecordingNotifier::new()) as Arc<dyn LocalNotifier>,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecided_shows_allow_and_not_now() {
        let push = Arc::new(SimulatedPush::new());
        let prompt = PermissionPrompt::new(native(&push));
        assert!(prompt.view().is_none());

        assert_eq!(prompt.refresh().await, PermissionStatus::Prompt);
        let view = prompt.view().expect("visible");
        assert_eq!(view.icon, PromptIcon::Bell);
        assert_eq!(view.title_key, "enableNotifications");
        assert_eq!(
            view.actions,
            vec![PromptAction::Allow { requesting: false }, PromptAction::NotNow]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_grants_hides_and_initializes() {
        let push = Arc::new(SimulatedPush::new());
        let adapter = native(&push);
        let prompt = PermissionPrompt::new(Arc::clone(&adapter));
        prompt.refresh().await;

        assert!(prompt.allow().await);
        assert!(prompt.view().is_none());
        assert_eq!(push.calls().register, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_refused_switches_to_denied_view() {
        let push = Arc::new(SimulatedPush::new().denying());
        let prompt = PermissionPrompt::new(native(&push));
        prompt.refresh().await;

        assert!(!prompt.allow().await);
        let view = prompt.view().expect("still visible");
        assert_eq!(view.icon, PromptIcon::BellOff);
        assert_eq!(view.description_key, "notificationPermissionDeniedDesc");
        assert_eq!(view.actions, vec![PromptAction::OpenSettings, PromptAction::NotNow]);
    }

    #[tokio::test]
    async fn test_granted_never_shows() {
        let push = Arc::new(SimulatedPush::new().with_permission(PermissionStatus::Granted));
        let prompt = PermissionPrompt::new(web(&push));
        prompt.refresh().await;
        assert!(prompt.view().is_none());
    }

    #[tokio::test]
    async fn test_dismiss_hides() {
        let push = Arc::new(SimulatedPush::new());
        let prompt = PermissionPrompt::new(web(&push));
        prompt.refresh().await;
        prompt.dismiss();
        assert!(prompt.view().is_none());
    }

    #[tokio::test]
    async fn test_open_settings_per_platform() {
        let push = Arc::new(SimulatedPush::new().with_permission(PermissionStatus::Denied));
        let native_prompt = PermissionPrompt::new(native(&push));
        assert_eq!(
            native_prompt.open_settings().await,
            SettingsAction::ShowInstructions("notificationSettingsInstructions")
        );

        let web_prompt = PermissionPrompt::new(web(&push));
        assert_eq!(
            web_prompt.open_settings().await,
            SettingsAction::Requested(PermissionStatus::Denied)
        );
    }
}
