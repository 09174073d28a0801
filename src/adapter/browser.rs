//! Browser push through the hosted messaging channel.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{present, InitState, LocalNotification, LocalNotifier, NotificationAdapter, Platform};
use crate::constants::DEFAULT_NOTIFICATION_ICON;
use crate::error::NotifyError;
use crate::payload::PushPayload;
use crate::permission::PermissionStatus;
use crate::router::ForegroundRouter;
use crate::token::TokenStore;

/// Browser notification permission plus the messaging SDK.
#[async_trait]
pub trait BrowserMessaging: Send + Sync {
    /// `Notification.permission`; synchronous in browsers.
    fn permission(&self) -> PermissionStatus;

    /// `Notification.requestPermission()`.
    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Subscribe to foreground messages.
    async fn on_message(&self) -> Result<mpsc::UnboundedReceiver<PushPayload>>;

    /// Ask the messaging service for this browser's registration token.
    async fn get_token(&self, vapid_key: Option<&str>) -> Result<Option<String>>;
}

/// Browser-specific settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Application server key for token requests.
    pub vapid_key: Option<String>,
    /// Icon for locally shown notifications.
    pub icon: String,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            vapid_key: None,
            icon: DEFAULT_NOTIFICATION_ICON.to_string(),
        }
    }
}

/// Browser variant of [`NotificationAdapter`].
pub struct BrowserAdapter {
    messaging: Arc<dyn BrowserMessaging>,
    options: BrowserOptions,
    tokens: TokenStore,
    router: Arc<ForegroundRouter>,
    local: Arc<dyn LocalNotifier>,
    state: tokio::sync::Mutex<InitState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BrowserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserAdapter")
            .field("options", &self.options)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl BrowserAdapter {
    /// Create the adapter with an empty token store.
    pub fn new(
        messaging: Arc<dyn BrowserMessaging>,
        options: BrowserOptions,
        router: Arc<ForegroundRouter>,
        local: Arc<dyn LocalNotifier>,
    ) -> Self {
        Self {
            messaging,
            options,
            tokens: TokenStore::new(),
            router,
            local,
            state: tokio::sync::Mutex::new(InitState::default()),
            listener: Mutex::new(None),
        }
    }

    async fn setup(&self, state: &mut InitState) -> Result<bool> {
        let current = self.messaging.permission();
        log::info!("[Push] Current web permission status: {current}");

        let status = if state.prompted {
            current
        } else {
            let requested = self.messaging.request_permission().await?;
            state.prompted = true;
            log::info!("[Push] Web permission request result: {requested}");
            requested
        };
        if !status.is_granted() {
            log::warn!("[Push] Web notification permission denied");
            return Ok(false);
        }

        if !state.listening {
            let rx = self.messaging.on_message().await?;
            self.attach_listener(rx);
            state.listening = true;
        }

        match self
            .messaging
            .get_token(self.options.vapid_key.as_deref())
            .await
        {
            Ok(Some(token)) => {
                self.tokens.set(token.into());
                Ok(true)
            }
            Ok(None) => Err(NotifyError::RegistrationFailed(
                "messaging service returned no token".to_string(),
            )
            .into()),
            Err(e) => Err(NotifyError::RegistrationFailed(format!("{e:#}")).into()),
        }
    }

    fn attach_listener(&self, rx: mpsc::UnboundedReceiver<PushPayload>) {
        let handle = tokio::spawn(pump_messages(
            rx,
            Arc::clone(&self.messaging),
            self.options.icon.clone(),
            Arc::clone(&self.router),
            Arc::clone(&self.local),
        ));
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(handle);
        }
        log::info!("[Push] Web foreground listener attached");
    }
}

async fn pump_messages(
    mut rx: mpsc::UnboundedReceiver<PushPayload>,
    messaging: Arc<dyn BrowserMessaging>,
    icon: String,
    router: Arc<ForegroundRouter>,
    local: Arc<dyn LocalNotifier>,
) {
    while let Some(payload) = rx.recv().await {
        log::info!("[Push] Web push notification received");
        router.route(&payload).await;
        if messaging.permission().is_granted() {
            present(local.as_ref(), LocalNotification::web(&payload, &icon)).await;
        }
    }
    log::debug!("[Push] Web message stream closed");
}

impl Drop for BrowserAdapter {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.listener.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl NotificationAdapter for BrowserAdapter {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn initialize(&self) {
        let mut state = self.state.lock().await;
        if state.initialized {
            return;
        }

        log::info!("[Push] Starting initialization (platform: web)");
        match self.setup(&mut state).await {
            Ok(true) => {
                state.initialized = true;
                log::info!("[Push] Initialization completed successfully");
            }
            Ok(false) => {}
            Err(e) => log::error!("[Push] Failed to initialize: {e:#}"),
        }
    }

    async fn check_permission(&self) -> PermissionStatus {
        let status = self.messaging.permission();
        log::debug!("[Push] Web permission status: {status}");
        status
    }

    async fn request_permission(&self) -> bool {
        match self.messaging.request_permission().await {
            Ok(status) => {
                log::info!("[Push] Web permission request result: {status}");
                status.is_granted()
            }
            Err(e) => {
                log::error!("[Push] Error requesting permission: {e:#}");
                false
            }
        }
    }

    fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::simulated::{RecordingNotifier, SimulatedPush};
    use crate::auth::CurrentUser;
    use crate::i18n::Catalog;
    use crate::store::{MemoryStore, NotificationLog};
    use crate::toast::RecordingToasts;
    use crate::token::RegistrationToken;
    use std::time::Duration;

    fn adapter(push: &Arc<SimulatedPush>, local: &Arc<RecordingNotifier>) -> BrowserAdapter {
        let router = Arc::new(ForegroundRouter::new(
            Arc::new(CurrentUser::new()),
            Arc::new(MemoryStore::new()) as Arc<dyn NotificationLog>,
            Arc::new(RecordingToasts::new()),
            Arc::new(Catalog::english()),
        ));
        BrowserAdapter::new(
            Arc::clone(push) as Arc<dyn BrowserMessaging>,
            BrowserOptions {
                vapid_key: Some("vapid-key".into()),
                ..BrowserOptions::default()
            },
            router,
            Arc::clone(local) as Arc<dyn LocalNotifier>,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_requests_token_with_vapid_key() {
        let push = Arc::new(SimulatedPush::new().with_token("web-token"));
        let local = Arc::new(RecordingNotifier::new());
        let adapter = adapter(&push, &local);

        adapter.initialize().await;
        assert_eq!(adapter.fcm_token(), Some(RegistrationToken::new("web-token")));
        assert_eq!(push.last_vapid_key().as_deref(), Some("vapid-key"));
        assert_eq!(adapter.platform(), Platform::Web);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_leaves_adapter_retryable() {
        let push = Arc::new(SimulatedPush::new().without_token());
        let local = Arc::new(RecordingNotifier::new());
        let adapter = adapter(&push, &local);

        adapter.initialize().await;
        adapter.initialize().await;
        let calls = push.calls();
        assert_eq!(calls.token, 2);
        assert_eq!(calls.listen, 1);
        assert!(adapter
            .wait_for_fcm_token(Duration::from_millis(500))
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_message_shows_browser_notification() {
        let push = Arc::new(SimulatedPush::new());
        let local = Arc::new(RecordingNotifier::new());
        let adapter = adapter(&push, &local);
        adapter.initialize().await;

        assert!(push.deliver(
            PushPayload::from_json(r#"{"notification": {"title": "Hi", "body": "There"}}"#)
                .expect("payload")
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let shown = local.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Hi");
        assert_eq!(shown[0].icon.as_deref(), Some("/icons/icon-192x192.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_browser_is_prompted_once() {
        let push = Arc::new(SimulatedPush::new().denying());
        let local = Arc::new(RecordingNotifier::new());
        let adapter = adapter(&push, &local);

        adapter.initialize().await;
        adapter.initialize().await;
        assert_eq!(push.calls().request, 1);
        assert_eq!(push.calls().token, 0);

        push.set_permission(PermissionStatus::Granted);
        adapter.initialize().await;
        assert_eq!(push.calls().request, 1);
        assert_eq!(push.calls().token, 1);
        assert!(adapter.fcm_token().is_some());
    }

    #[tokio::test]
    async fn test_check_permission_reads_browser_state() {
        let push = Arc::new(SimulatedPush::new().with_permission(PermissionStatus::Denied));
        let local = Arc::new(RecordingNotifier::new());
        let adapter = adapter(&push, &local);
        assert_eq!(adapter.check_permission().await, PermissionStatus::Denied);
        assert!(!adapter.request_permission().await);
    }
}
