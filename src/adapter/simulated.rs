//! Scripted push platform for headless runs and tests.
//!
//! [`SimulatedPush`] implements both bridge traits, so either adapter variant
//! can be driven without a device or browser. Behaviour is configured up
//! front (grant or deny, token value and delay, registration failure) and
//! foreground messages are injected with [`SimulatedPush::deliver`].

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{BrowserMessaging, LocalNotification, LocalNotifier, NativeEvent, NativePushBridge};
use crate::payload::PushPayload;
use crate::permission::PermissionStatus;

/// Snapshot of how often each platform call was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Permission requests.
    pub request: usize,
    /// Native registrations.
    pub register: usize,
    /// Listener attachments (native or web).
    pub listen: usize,
    /// Browser token requests.
    pub token: usize,
}

#[derive(Debug, Default)]
struct Counters {
    request: AtomicUsize,
    register: AtomicUsize,
    listen: AtomicUsize,
    token: AtomicUsize,
}

/// Scripted stand-in for the native plugin and the browser messaging SDK.
#[derive(Debug)]
pub struct SimulatedPush {
    permission: Mutex<PermissionStatus>,
    grant_on_request: bool,
    token: Option<String>,
    token_delay: Duration,
    fail_registration: bool,
    fail_permission_check: bool,
    native_tx: Mutex<Option<mpsc::UnboundedSender<NativeEvent>>>,
    web_tx: Mutex<Option<mpsc::UnboundedSender<PushPayload>>>,
    last_vapid_key: Mutex<Option<String>>,
    counters: Counters,
}

impl Default for SimulatedPush {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPush {
    /// Undecided permission that is granted on request; issues a token 50ms
    /// after registration.
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(PermissionStatus::Prompt),
            grant_on_request: true,
            token: Some(format!("sim-{}", uuid::Uuid::new_v4().simple())),
            token_delay: Duration::from_millis(50),
            fail_registration: false,
            fail_permission_check: false,
            native_tx: Mutex::new(None),
            web_tx: Mutex::new(None),
            last_vapid_key: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    /// The user refuses when prompted.
    pub fn denying(mut self) -> Self {
        self.grant_on_request = false;
        self
    }

    /// Start from an already decided permission.
    pub fn with_permission(self, status: PermissionStatus) -> Self {
        self.set_permission(status);
        self
    }

    /// Issue this token on registration.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Registration succeeds but no token ever arrives.
    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    /// Delay between registration and token delivery.
    pub fn token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Registration calls fail.
    pub fn failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }

    /// Native permission checks fail (plugin unavailable).
    pub fn failing_permission_check(mut self) -> Self {
        self.fail_permission_check = true;
        self
    }

    /// Change the permission from outside the app, as system settings would.
    pub fn set_permission(&self, status: PermissionStatus) {
        if let Ok(mut p) = self.permission.lock() {
            *p = status;
        }
    }

    /// Call counts so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            request: self.counters.request.load(Ordering::Relaxed),
            register: self.counters.register.load(Ordering::Relaxed),
            listen: self.counters.listen.load(Ordering::Relaxed),
            token: self.counters.token.load(Ordering::Relaxed),
        }
    }

    /// VAPID key passed to the last browser token request.
    pub fn last_vapid_key(&self) -> Option<String> {
        self.last_vapid_key.lock().ok().and_then(|k| k.clone())
    }

    /// Push a foreground message to whichever listener is attached.
    ///
    /// Returns `false` when nothing is listening.
    pub fn deliver(&self, payload: PushPayload) -> bool {
        if let Some(tx) = self.native_tx.lock().ok().and_then(|t| t.clone()) {
            return tx.send(NativeEvent::Received(payload)).is_ok();
        }
        if let Some(tx) = self.web_tx.lock().ok().and_then(|t| t.clone()) {
            return tx.send(payload).is_ok();
        }
        false
    }

    fn current(&self) -> PermissionStatus {
        self.permission.lock().map(|p| *p).unwrap_or(PermissionStatus::Denied)
    }

    fn prompt(&self) -> PermissionStatus {
        self.counters.request.fetch_add(1, Ordering::Relaxed);
        let Ok(mut permission) = self.permission.lock() else {
            return PermissionStatus::Denied;
        };
        // Platforms only prompt once; a decided permission is returned as-is.
        if *permission == PermissionStatus::Prompt {
            *permission = if self.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        *permission
    }
}

#[async_trait]
impl NativePushBridge for SimulatedPush {
    async fn check_permissions(&self) -> Result<PermissionStatus> {
        if self.fail_permission_check {
            anyhow::bail!("push plugin not available");
        }
        Ok(self.current())
    }

    async fn request_permissions(&self) -> Result<PermissionStatus> {
        Ok(self.prompt())
    }

    async fn register(&self) -> Result<()> {
        self.counters.register.fetch_add(1, Ordering::Relaxed);
        if self.fail_registration {
            anyhow::bail!("simulated push service unavailable");
        }

        let tx = self.native_tx.lock().ok().and_then(|t| t.clone());
        if let (Some(tx), Some(token)) = (tx, self.token.clone()) {
            let delay = self.token_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(NativeEvent::Registration(token));
            });
        }
        Ok(())
    }

    fn listen(&self) -> mpsc::UnboundedReceiver<NativeEvent> {
        self.counters.listen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.native_tx.lock() {
            *slot = Some(tx);
        }
        rx
    }
}

#[async_trait]
impl BrowserMessaging for SimulatedPush {
    fn permission(&self) -> PermissionStatus {
        self.current()
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(self.prompt())
    }

    async fn on_message(&self) -> Result<mpsc::UnboundedReceiver<PushPayload>> {
        self.counters.listen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.web_tx.lock() {
            *slot = Some(tx);
        }
        Ok(rx)
    }

    async fn get_token(&self, vapid_key: Option<&str>) -> Result<Option<String>> {
        self.counters.token.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.last_vapid_key.lock() {
            *slot = vapid_key.map(str::to_string);
        }
        if self.fail_registration {
            anyhow::bail!("token-subscribe-failed");
        }
        tokio::time::sleep(self.token_delay).await;
        Ok(self.token.clone())
    }
}

/// Local notifier that records instead of displaying.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<LocalNotification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything shown so far.
    pub fn shown(&self) -> Vec<LocalNotification> {
        self.shown.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LocalNotifier for RecordingNotifier {
    async fn show(&self, notification: LocalNotification) -> Result<()> {
        self.shown
            .lock()
            .map_err(|e| anyhow::anyhow!("notifier lock poisoned: {e}"))?
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prompt_only_decides_once() {
        let push = SimulatedPush::new().denying();
        assert_eq!(push.request_permissions().await.unwrap(), PermissionStatus::Denied);

        let granted = SimulatedPush::new().with_permission(PermissionStatus::Denied);
        assert_eq!(
            NativePushBridge::request_permissions(&granted).await.unwrap(),
            PermissionStatus::Denied
        );
        assert_eq!(granted.calls().request, 1);
    }

    #[tokio::test]
    async fn test_deliver_without_listener_is_dropped() {
        let push = SimulatedPush::new();
        assert!(!push.deliver(PushPayload::default()));
    }
}
