//! Native mobile push through the web-to-native bridge.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{present, InitState, LocalNotification, LocalNotifier, NotificationAdapter, Platform};
use crate::constants::DEFAULT_PRESENTATION_OPTIONS;
use crate::error::NotifyError;
use crate::payload::{PushAction, PushPayload};
use crate::permission::PermissionStatus;
use crate::router::ForegroundRouter;
use crate::token::TokenStore;

/// Events the native push plugin delivers to attached listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// Registration succeeded; carries the device token.
    Registration(String),
    /// Registration failed.
    RegistrationError(String),
    /// A push arrived while the app is in the foreground.
    Received(PushPayload),
    /// The user acted on a delivered notification.
    ActionPerformed(PushAction),
}

/// The native push plugin surface.
#[async_trait]
pub trait NativePushBridge: Send + Sync {
    /// Current permission without prompting.
    async fn check_permissions(&self) -> Result<PermissionStatus>;

    /// Prompt the user (or return the remembered decision).
    async fn request_permissions(&self) -> Result<PermissionStatus>;

    /// Register with the platform push service. The token arrives later as
    /// [`NativeEvent::Registration`].
    async fn register(&self) -> Result<()>;

    /// Attach listeners; events arrive on the returned channel for as long as
    /// the receiver is held.
    fn listen(&self) -> mpsc::UnboundedReceiver<NativeEvent>;
}

/// Native variant of [`NotificationAdapter`].
pub struct NativeAdapter {
    bridge: Arc<dyn NativePushBridge>,
    tokens: TokenStore,
    router: Arc<ForegroundRouter>,
    local: Arc<dyn LocalNotifier>,
    presentation: Vec<String>,
    state: tokio::sync::Mutex<InitState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for NativeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeAdapter")
            .field("tokens", &self.tokens)
            .field("presentation", &self.presentation)
            .finish_non_exhaustive()
    }
}

impl NativeAdapter {
    /// Create the adapter with an empty token store.
    pub fn new(
        bridge: Arc<dyn NativePushBridge>,
        router: Arc<ForegroundRouter>,
        local: Arc<dyn LocalNotifier>,
    ) -> Self {
        Self {
            bridge,
            tokens: TokenStore::new(),
            router,
            local,
            presentation: DEFAULT_PRESENTATION_OPTIONS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            state: tokio::sync::Mutex::new(InitState::default()),
            listener: Mutex::new(None),
        }
    }

    /// Foreground presentation (`alert`, `sound`, `badge`). Without `alert`
    /// foreground messages are routed but not shown as a local notification;
    /// without `sound` they are shown silently.
    pub fn with_presentation_options(mut self, options: Vec<String>) -> Self {
        self.presentation = options;
        self
    }

    /// Permission → listeners → register. `Ok(false)` when permission was not granted.
    ///
    /// The user is prompted at most once per adapter; later calls only see
    /// whether the permission was granted since (e.g. from system settings).
    async fn setup(&self, state: &mut InitState) -> Result<bool> {
        let current = self.bridge.check_permissions().await?;
        log::info!("[Push] Current permission status: {current}");

        let status = if state.prompted {
            current
        } else {
            let requested = self.bridge.request_permissions().await?;
            state.prompted = true;
            log::info!("[Push] Permission request result: {requested}");
            requested
        };
        if !status.is_granted() {
            log::warn!("[Push] Push notification permission denied or not granted");
            return Ok(false);
        }

        // Listeners go on before register() so the registration event can't be missed.
        if !state.listening {
            self.attach_listeners();
            state.listening = true;
        }

        self.bridge
            .register()
            .await
            .map_err(|e| NotifyError::RegistrationFailed(format!("{e:#}")))?;
        log::info!("[Push] Registered for push notifications; waiting for token");
        Ok(true)
    }

    fn attach_listeners(&self) {
        let rx = self.bridge.listen();
        let handle = tokio::spawn(pump_events(
            rx,
            self.tokens.clone(),
            Arc::clone(&self.router),
            Arc::clone(&self.local),
            self.presentation.clone(),
        ));
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(handle);
        }
        log::info!("[Push] Native listeners attached");
    }
}

async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<NativeEvent>,
    tokens: TokenStore,
    router: Arc<ForegroundRouter>,
    local: Arc<dyn LocalNotifier>,
    presentation: Vec<String>,
) {
    let presents = |option: &str| presentation.iter().any(|o| o == option);
    let alert = presents("alert");
    let sound = presents("sound");
    while let Some(event) = rx.recv().await {
        match event {
            NativeEvent::Registration(token) => {
                log::info!("[Push] Push registration success");
                tokens.set(token.into());
            }
            NativeEvent::RegistrationError(error) => {
                log::error!("[Push] {}", NotifyError::RegistrationFailed(error));
            }
            NativeEvent::Received(payload) => {
                log::info!("[Push] Push notification received");
                router.route(&payload).await;
                if alert {
                    let mut notification = LocalNotification::native(&payload);
                    if !sound {
                        notification.sound = None;
                    }
                    present(local.as_ref(), notification).await;
                }
            }
            NativeEvent::ActionPerformed(action) => {
                log::info!(
                    "[Push] Push notification action performed: {} (id={:?})",
                    action.action_id,
                    action.notification.id
                );
            }
        }
    }
    log::debug!("[Push] Native event stream closed");
}

impl Drop for NativeAdapter {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.listener.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl NotificationAdapter for NativeAdapter {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    async fn initialize(&self) {
        let mut state = self.state.lock().await;
        if state.initialized {
            return;
        }

        log::info!("[Push] Starting initialization (platform: native)");
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
        match self.bridge.check_permissions().await {
            Ok(status) => {
                log::debug!("[Push] Native permission status: {status}");
                status
            }
            Err(e) => {
                log::error!("[Push] Error checking permission: {e:#}");
                PermissionStatus::Denied
            }
        }
    }

    async fn request_permission(&self) -> bool {
        match self.bridge.request_permissions().await {
            Ok(status) => {
                log::info!("[Push] Native permission request result: {status}");
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
    use crate::auth::{AuthUser, CurrentUser};
    use crate::i18n::Catalog;
    use crate::store::MemoryStore;
    use crate::toast::RecordingToasts;
    use crate::token::RegistrationToken;
    use std::time::Duration;

    struct Fixture {
        adapter: NativeAdapter,
        push: Arc<SimulatedPush>,
        local: Arc<RecordingNotifier>,
        store: Arc<MemoryStore>,
    }

    fn fixture(push: SimulatedPush) -> Fixture {
        fixture_with(push, |adapter| adapter)
    }

    fn fixture_with(
        push: SimulatedPush,
        configure: impl FnOnce(NativeAdapter) -> NativeAdapter,
    ) -> Fixture {
        let push = Arc::new(push);
        let store = Arc::new(MemoryStore::new());
        let local = Arc::new(RecordingNotifier::new());
        let current = Arc::new(CurrentUser::new());
        current.set(Some(AuthUser::new("u1")));
        let router = Arc::new(ForegroundRouter::new(
            current,
            Arc::clone(&store) as Arc<dyn crate::store::NotificationLog>,
            Arc::new(RecordingToasts::new()),
            Arc::new(Catalog::english()),
        ));
        let adapter = configure(NativeAdapter::new(
            Arc::clone(&push) as Arc<dyn NativePushBridge>,
            router,
            Arc::clone(&local) as Arc<dyn LocalNotifier>,
        ));
        Fixture {
            adapter,
            push,
            local,
            store,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_captures_token() {
        let f = fixture(SimulatedPush::new().with_token("native-token-abc"));
        f.adapter.initialize().await;

        let expected = Some(RegistrationToken::new("native-token-abc"));
        let token = f.adapter.wait_for_fcm_token(Duration::from_secs(15)).await;
        assert_eq!(token, expected);
        assert_eq!(f.adapter.fcm_token(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_is_idempotent() {
        let f = fixture(SimulatedPush::new());
        f.adapter.initialize().await;
        f.adapter.initialize().await;
        tokio::join!(f.adapter.initialize(), f.adapter.initialize());

        let calls = f.push.calls();
        assert_eq!(calls.register, 1);
        assert_eq!(calls.listen, 1);
        assert_eq!(calls.request, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_skips_registration() {
        let f = fixture(SimulatedPush::new().denying());
        f.adapter.initialize().await;

        assert_eq!(f.push.calls().register, 0);
        assert_eq!(f.adapter.check_permission().await, PermissionStatus::Denied);
        assert!(f.adapter.wait_for_fcm_token(Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_is_not_requested_again() {
        let f = fixture(SimulatedPush::new().denying());
        for _ in 0..3 {
            f.adapter.initialize().await;
        }

        let calls = f.push.calls();
        assert_eq!(calls.request, 1);
        assert_eq!(calls.register, 0);
        assert_eq!(calls.listen, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_from_settings_completes_setup_without_prompting() {
        let f = fixture(SimulatedPush::new().denying().with_token("late-grant"));
        f.adapter.initialize().await;

        f.push.set_permission(PermissionStatus::Granted);
        f.adapter.initialize().await;
        f.adapter.initialize().await;

        let calls = f.push.calls();
        assert_eq!(calls.request, 1);
        assert_eq!(calls.register, 1);
        assert_eq!(
            f.adapter.wait_for_fcm_token(Duration::from_secs(1)).await,
            Some(RegistrationToken::new("late-grant"))
        );
    }

    #[tokio::test]
    async fn test_check_permission_error_reports_denied() {
        let f = fixture(SimulatedPush::new().failing_permission_check());
        assert_eq!(f.adapter.check_permission().await, PermissionStatus::Denied);

        // Setup aborts on the failed check and stays retryable
        f.adapter.initialize().await;
        assert_eq!(f.push.calls().register, 0);
        assert!(f.adapter.fcm_token().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_failure_allows_retry_without_second_listener() {
        let f = fixture(SimulatedPush::new().failing_registration());
        f.adapter.initialize().await;
        f.adapter.initialize().await;

        let calls = f.push.calls();
        assert_eq!(calls.register, 2);
        assert_eq!(calls.listen, 1);
        assert!(f.adapter.fcm_token().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_received_message_is_routed_and_displayed() {
        let f = fixture(SimulatedPush::new());
        f.adapter.initialize().await;

        let payload = PushPayload::from_json(
            r#"{"title": "Order", "body": "Confirmed", "data": {"titleKey": "orderTitle"}}"#,
        )
        .expect("payload");
        assert!(f.push.deliver(payload));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(f.local.shown().len(), 1);
        assert_eq!(f.local.shown()[0].title, "Order");
        assert_eq!(f.store.notifications("u1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presentation_options_control_local_display() {
        let payload = || {
            PushPayload::from_json(r#"{"title": "Quiet", "body": "Update"}"#).expect("payload")
        };

        let silent = fixture_with(SimulatedPush::new(), |a| {
            a.with_presentation_options(vec!["alert".into(), "badge".into()])
        });
        silent.adapter.initialize().await;
        assert!(silent.push.deliver(payload()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let shown = silent.local.shown();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].sound.is_none());

        let hidden = fixture_with(SimulatedPush::new(), |a| {
            a.with_presentation_options(vec!["badge".into()])
        });
        hidden.adapter.initialize().await;
        assert!(hidden.push.deliver(payload()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(hidden.local.shown().is_empty());
        assert_eq!(hidden.store.notifications("u1").len(), 1);
    }
}
