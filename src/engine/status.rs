use crate::traits::StatusSink;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub text: String,
    pub active_base: Option<String>,
    pub active_overlays: BTreeSet<String>,
}

/// In-memory status line plus the active markers the UI renders.
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: Mutex<StatusSnapshot>,
}

impl StatusBoard {
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn text(&self) -> String {
        self.snapshot().text
    }

    fn with<R>(&self, f: impl FnOnce(&mut StatusSnapshot) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl StatusSink for StatusBoard {
    fn update(&self, text: &str) {
        info!(status = text);
        self.with(|s| s.text = text.to_string());
    }

    fn mark_base(&self, key: &str) {
        self.with(|s| s.active_base = Some(key.to_string()));
    }

    fn mark_overlay(&self, key: &str, active: bool) {
        self.with(|s| {
            if active {
                s.active_overlays.insert(key.to_string());
            } else {
                s.active_overlays.remove(key);
            }
        });
    }
}
