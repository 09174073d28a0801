//! Transient user-facing messages.
//!
//! The rendering layer owns presentation; this crate only hands it
//! already-translated text through [`ToastSink`].

use serde::Serialize;
use std::sync::Mutex;

/// Visual weight of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    /// Informational.
    #[default]
    Default,
    /// Error / blocked state.
    Destructive,
}

/// A translated toast ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    /// Headline text.
    pub title: String,
    /// Body text.
    pub description: String,
    /// Visual weight.
    pub variant: ToastVariant,
}

impl Toast {
    /// Informational toast.
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
        }
    }

    /// Destructive toast.
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Destructive,
        }
    }
}

/// Receives toasts from the bootstrapper and router.
pub trait ToastSink: Send + Sync {
    /// Display a toast. Must not block.
    fn show(&self, toast: Toast);
}

/// Sink that keeps every toast it is given.
///
/// Used by the CLI to print what a session would have shown.
#[derive(Debug, Default)]
pub struct RecordingToasts {
    shown: Mutex<Vec<Toast>>,
}

impl RecordingToasts {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all toasts shown so far.
    pub fn shown(&self) -> Vec<Toast> {
        self.shown.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Remove and return all recorded toasts.
    pub fn take(&self) -> Vec<Toast> {
        self.shown
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }
}

impl ToastSink for RecordingToasts {
    fn show(&self, toast: Toast) {
        log::debug!("[Toast] {}: {}", toast.title, toast.description);
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(toast);
        }
    }
}
